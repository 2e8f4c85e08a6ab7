//! # Graph builder
//!
//! Emits the energy of one expansion move: data terms per assignment, Potts terms per pair of
//! neighbours, and the hard constraints keeping every pixel in at most one active assignment.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use crate::energy::Energy;
use crate::frame::{Coord, NEIGHBOURS};
use crate::maxflow::MaxFlowGraph;

use super::state::{Node, Snapshot};
use super::Matcher;

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl<G: MaxFlowGraph> Matcher<G> {
    /// Emit the energy of the expansion move of `a` into `e`.
    ///
    /// With every variable at `0` the graph energy equals the energy of the current state, so
    /// the minimum never exceeds it.
    pub(super) fn build_graph(&self, e: &mut Energy<G>, a: i32) -> Snapshot {
        let size = self.model.left_size();
        let mut snapshot = Snapshot {
            alpha: a,
            vars0: vec![Node::NonPresent; size.area()],
            vars_a: vec![Node::NonPresent; size.area()],
        };

        for p in size.coords() {
            self.build_nodes(e, &mut snapshot, p, a);
        }

        for p in size.coords() {
            for &offset in NEIGHBOURS.iter() {
                let np = p + offset;
                if size.contains(np) {
                    self.build_smoothness(e, &snapshot, p, np, a);
                }
            }
        }

        for p in size.coords() {
            self.build_uniqueness_lr(e, &snapshot, p);
        }

        for r in self.model.right_size().coords() {
            self.build_uniqueness_rl(e, &snapshot, r, a);
        }

        snapshot
    }

    /// Variables for the current assignment of `p` and for `(p, p + a)`, with their data costs.
    fn build_nodes(&self, e: &mut Energy<G>, snapshot: &mut Snapshot, p: Coord, a: i32) {
        let i = self.model.left_size().index(p);
        let d = self.x_left().get(p);

        if d == Some(a) {
            snapshot.vars0[i] = Node::Active;
            snapshot.vars_a[i] = Node::Active;
            e.add_constant(self.data_occlusion_penalty(p, p.shift(a)));
            return;
        }

        snapshot.vars0[i] = match d {
            Some(d) => {
                let v = e.add_variable();
                e.add_term1(v, self.data_occlusion_penalty(p, p.shift(d)), 0);
                Node::Var(v)
            }
            None => Node::NonPresent,
        };

        let q = p.shift(a);
        snapshot.vars_a[i] = if self.model.right_size().contains(q) {
            let v = e.add_variable();
            e.add_term1(v, 0, self.data_occlusion_penalty(p, q));
            Node::Var(v)
        } else {
            Node::NonPresent
        };
    }

    /// Potts terms between neighbours `p` and `np`, for label `a` and for their current labels.
    fn build_smoothness(&self, e: &mut Energy<G>, snapshot: &Snapshot, p: Coord, np: Coord, a: i32) {
        let size = self.model.left_size();
        let right = self.model.right_size();
        let (i, ni) = (size.index(p), size.index(np));

        let (va, nva) = (snapshot.vars_a[i], snapshot.vars_a[ni]);
        if va.is_present() && nva.is_present() {
            let delta = self.smoothness_penalty(p, np, a);
            match (va, nva) {
                (Node::Var(x), Node::Var(y)) => e.add_term2(x, y, 0, delta, delta, 0),
                (Node::Var(x), Node::Active) => e.add_term1(x, delta, 0),
                (Node::Active, Node::Var(y)) => e.add_term1(y, delta, 0),
                _ => {}
            }
        }

        let (d, nd) = (self.x_left().get(p), self.x_left().get(np));
        let (o, no) = (snapshot.vars0[i], snapshot.vars0[ni]);

        if d == nd {
            if let (Node::Var(x), Node::Var(y), Some(d)) = (o, no, d) {
                let delta = self.smoothness_penalty(p, np, d);
                e.add_term2(x, y, 0, delta, delta, 0);
            }
            return;
        }

        // different current labels, each pays if kept while the neighbour's match exists
        if let (Node::Var(x), Some(d)) = (o, d) {
            if right.contains(np.shift(d)) {
                e.add_term1(x, self.smoothness_penalty(p, np, d), 0);
            }
        }
        if let (Node::Var(y), Some(nd)) = (no, nd) {
            if right.contains(p.shift(nd)) {
                e.add_term1(y, self.smoothness_penalty(p, np, nd), 0);
            }
        }
    }

    /// Left pixel `p` cannot keep its assignment and take `(p, p + a)`.
    fn build_uniqueness_lr(&self, e: &mut Energy<G>, snapshot: &Snapshot, p: Coord) {
        let i = self.model.left_size().index(p);

        if let (Node::Var(o), Node::Var(va)) = (snapshot.vars0[i], snapshot.vars_a[i]) {
            e.forbid01(o, va);
        }
    }

    /// Right pixel `r` cannot keep its assignment and be taken by `(r - a, r)`.
    fn build_uniqueness_rl(&self, e: &mut Energy<G>, snapshot: &Snapshot, r: Coord, a: i32) {
        let size = self.model.left_size();

        let d = match self.x_right().get(r) {
            Some(d) => d,
            None => return,
        };

        let o = match snapshot.vars0[size.index(r.shift(d))] {
            Node::Var(o) => o,
            _ => return,
        };

        let q = r.shift(-a);
        if !size.contains(q) {
            return;
        }
        if let Node::Var(va) = snapshot.vars_a[size.index(q)] {
            e.forbid01(o, va);
        }
    }
}
