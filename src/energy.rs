//! # Binary energies
//!
//! Minimisation of energies of the form
//!
//! `E(x) = const + Σ E_i(x_i) + Σ E_ij(x_i, x_j)`, `x_i ∈ {0, 1}`
//!
//! by a single minimum cut, following Kolmogorov & Zabih, "What energy functions can be minimized
//! via graph cuts?". Every pairwise term must be regular: `E(0,0) + E(1,1) <= E(0,1) + E(1,0)`.
//! Variable `x = 0` is the source side of the cut.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use crate::maxflow::{Capacity, Dinic, MaxFlowGraph, NodeId, Segment};

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Weight of a forbidden configuration. Large enough to never be part of a minimum cut while
/// leaving room for sums of ordinary terms.
pub const INFINITE: Value = 1 << 48;

// -----------------------------------------------------------------------------------------------
// TYPES
// -----------------------------------------------------------------------------------------------

pub type Value = Capacity;

/// Handle to a binary variable.
pub type Var = NodeId;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

pub struct Energy<G: MaxFlowGraph = Dinic> {
    graph: G,
    constant: Value,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl<G: MaxFlowGraph> Energy<G> {
    pub fn new() -> Self {
        Energy {
            graph: G::default(),
            constant: 0,
        }
    }

    pub fn add_variable(&mut self) -> Var {
        self.graph.add_node()
    }

    pub fn add_constant(&mut self, e: Value) {
        self.constant += e;
    }

    /// Add `E(x)` with `E(0) = e0`, `E(1) = e1`.
    pub fn add_term1(&mut self, x: Var, e0: Value, e1: Value) {
        self.graph.add_tweights(x, e1, e0);
    }

    /// Add `E(x, y)` given by the table `a = E(0,0)`, `b = E(0,1)`, `c = E(1,0)`, `d = E(1,1)`.
    pub fn add_term2(&mut self, x: Var, y: Var, a: Value, b: Value, c: Value, d: Value) {
        //  a b  =  a a  +  0   b-a
        //  c d     d d     c-d 0
        self.graph.add_tweights(x, d, a);
        let b = b - a;
        let c = c - d;

        debug_assert!(b + c >= 0, "non-regular pairwise term");

        if b < 0 {
            //  0 b  =  b b  +  -b 0  +  0   0
            //  c 0     0 0     -b 0     b+c 0
            self.graph.add_tweights(x, 0, b);
            self.graph.add_tweights(y, 0, -b);
            self.graph.add_edge(x, y, 0, b + c);
        } else if c < 0 {
            //  0 b  =  -c -c  +  c 0  +  0 b+c
            //  c 0      0  0     c 0     0 0
            self.graph.add_tweights(x, 0, -c);
            self.graph.add_tweights(y, 0, c);
            self.graph.add_edge(x, y, b + c, 0);
        } else {
            self.graph.add_edge(x, y, b, c);
        }
    }

    /// Forbid `x = 0, y = 1`.
    pub fn forbid01(&mut self, x: Var, y: Var) {
        self.add_term2(x, y, 0, INFINITE, 0, 0);
    }

    /// Minimise and return the optimal energy.
    pub fn minimize(&mut self) -> Value {
        self.constant + self.graph.maxflow()
    }

    /// Optimal value of `x`, valid after `minimize`.
    pub fn get_var(&self, x: Var) -> u8 {
        match self.graph.what_segment(x) {
            Segment::Source => 0,
            Segment::Sink => 1,
        }
    }
}

impl<G: MaxFlowGraph> Default for Energy<G> {
    fn default() -> Self {
        Self::new()
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_force(terms1: &[(usize, Value, Value)], terms2: &[(usize, usize, [Value; 4])], n: usize) -> Value {
        (0..(1usize << n))
            .map(|bits| {
                let x = |i: usize| (bits >> i) & 1;
                let mut e = 0;
                for &(i, e0, e1) in terms1 {
                    e += if x(i) == 0 { e0 } else { e1 };
                }
                for &(i, j, t) in terms2 {
                    e += t[x(i) * 2 + x(j)];
                }
                e
            })
            .min()
            .unwrap()
    }

    #[test]
    fn unary_terms_pick_cheaper_side() {
        let mut e: Energy = Energy::new();
        let x = e.add_variable();
        let y = e.add_variable();
        e.add_constant(10);
        e.add_term1(x, 3, -2);
        e.add_term1(y, -4, 1);

        assert_eq!(e.minimize(), 10 - 2 - 4);
        assert_eq!(e.get_var(x), 1);
        assert_eq!(e.get_var(y), 0);
    }

    #[test]
    fn pairwise_matches_exhaustive_search() {
        let terms1 = [(0, 4, 0), (1, 0, 3), (2, -1, 2), (3, 5, -5)];
        let terms2 = [
            (0, 1, [0, 6, 6, 0]),
            (1, 2, [2, 3, 7, 1]),
            (2, 3, [-3, 4, 0, -2]),
            (0, 3, [1, 1, 5, 0]),
        ];

        let mut e: Energy = Energy::new();
        let v: Vec<_> = (0..4).map(|_| e.add_variable()).collect();
        for &(i, e0, e1) in &terms1 {
            e.add_term1(v[i], e0, e1);
        }
        for &(i, j, t) in &terms2 {
            e.add_term2(v[i], v[j], t[0], t[1], t[2], t[3]);
        }

        let best = e.minimize();
        assert_eq!(best, brute_force(&terms1, &terms2, 4));

        // the returned labelling attains the optimum
        let mut check = 0;
        for &(i, e0, e1) in &terms1 {
            check += if e.get_var(v[i]) == 0 { e0 } else { e1 };
        }
        for &(i, j, t) in &terms2 {
            check += t[e.get_var(v[i]) as usize * 2 + e.get_var(v[j]) as usize];
        }
        assert_eq!(check, best);
    }

    #[test]
    fn forbidden_configuration_is_avoided() {
        let mut e: Energy = Energy::new();
        let x = e.add_variable();
        let y = e.add_variable();
        // alone, x wants 0 and y wants 1
        e.add_term1(x, 0, 5);
        e.add_term1(y, 3, 0);
        e.forbid01(x, y);

        assert_eq!(e.minimize(), 3);
        assert_eq!((e.get_var(x), e.get_var(y)), (0, 0));
    }
}
