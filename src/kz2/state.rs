//! # Disparity state
//!
//! The current assignment of both images. If `l` is a left pixel and `r` a right pixel then
//!
//! - `r == l + (x_left[l], 0)`
//! - `l == r + (x_right[r], 0)`
//!
//! and both maps change together, so a match is always visible from either side.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use crate::energy::{Energy, Var};
use crate::error::*;
use crate::frame::{Coord, Size};
use crate::maxflow::MaxFlowGraph;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// Role of an assignment in the graph of one expansion move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    /// Active before and after the move, no variable needed.
    Active,
    /// Cannot be active: occluded, or the match falls outside the right image.
    NonPresent,
    /// Decided by the cut.
    Var(Var),
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Disparity per pixel of one image, `None` when occluded.
#[derive(Debug, Clone, PartialEq)]
pub struct DisparityField {
    size: Size,
    data: Vec<Option<i32>>,
}

/// `x_left` and `x_right`, kept consistent with each other.
#[derive(Debug, Clone, PartialEq)]
pub struct DisparityState {
    left: DisparityField,
    right: DisparityField,
}

/// Variables of one expansion move, per left pixel.
///
/// `vars0[p]` is the current assignment of `p` (`0` keeps it, `1` drops it), `vars_a[p]` the
/// assignment `(p, p + alpha)` (`1` takes it).
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub alpha: i32,
    pub vars0: Vec<Node>,
    pub vars_a: Vec<Node>,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Node {
    pub fn var(self) -> Option<Var> {
        match self {
            Node::Var(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_present(self) -> bool {
        self != Node::NonPresent
    }
}

impl DisparityField {
    /// A field with every pixel occluded.
    pub fn occluded(size: Size) -> Self {
        DisparityField {
            size,
            data: vec![None; size.area()],
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn get(&self, p: Coord) -> Option<i32> {
        self.data[self.size.index(p)]
    }

    fn set(&mut self, p: Coord, d: Option<i32>) {
        let i = self.size.index(p);
        self.data[i] = d;
    }

    /// Values in raster order.
    pub fn values(&self) -> &[Option<i32>] {
        &self.data
    }
}

impl DisparityState {
    pub fn occluded(left: Size, right: Size) -> Self {
        DisparityState {
            left: DisparityField::occluded(left),
            right: DisparityField::occluded(right),
        }
    }

    pub fn x_left(&self) -> &DisparityField {
        &self.left
    }

    pub fn x_right(&self) -> &DisparityField {
        &self.right
    }

    /// Check the two maps describe the same set of matches.
    pub fn is_consistent(&self) -> bool {
        let left_ok = self.left.size.coords().all(|l| match self.left.get(l) {
            Some(d) => {
                let r = l.shift(d);
                self.right.size.contains(r) && self.right.get(r) == Some(-d)
            }
            None => true,
        });
        let right_ok = self.right.size.coords().all(|r| match self.right.get(r) {
            Some(d) => {
                let l = r.shift(d);
                self.left.size.contains(l) && self.left.get(l) == Some(-d)
            }
            None => true,
        });

        left_ok && right_ok
    }

    /// Apply the cut of an expansion move.
    ///
    /// First drops every current assignment whose variable went to `1`, then activates every
    /// `(p, p + alpha)` whose variable went to `1`. The new matches are checked before anything is
    /// written, so on error the state is unchanged.
    pub fn commit<G: MaxFlowGraph>(&mut self, e: &Energy<G>, snapshot: &Snapshot) -> Result<()> {
        let a = snapshot.alpha;
        let size = self.left.size;
        let chosen = |node: Node| node.var().map_or(false, |v| e.get_var(v) == 1);

        let mut next = self.clone();

        for p in size.coords() {
            let i = size.index(p);
            if chosen(snapshot.vars0[i]) {
                if let Some(d) = next.left.get(p) {
                    next.left.set(p, None);
                    next.right.set(p.shift(d), None);
                }
            }
        }

        for p in size.coords() {
            let i = size.index(p);
            if chosen(snapshot.vars_a[i]) {
                if next.left.get(p).is_some() {
                    return Err(Error::SolverInconsistency(format!(
                        "left pixel ({}, {}) keeps its match while taking disparity {}",
                        p.x, p.y, a
                    )));
                }

                let r = p.shift(a);
                if !next.right.size.contains(r) {
                    return Err(Error::SolverInconsistency(format!(
                        "left pixel ({}, {}) matched outside the right image at disparity {}",
                        p.x, p.y, a
                    )));
                }
                if next.right.get(r).is_some() {
                    return Err(Error::SolverInconsistency(format!(
                        "right pixel ({}, {}) matched twice at disparity {}",
                        r.x, r.y, a
                    )));
                }

                next.left.set(p, Some(a));
                next.right.set(r, Some(-a));
            }
        }

        *self = next;
        Ok(())
    }
}
