//! # Min-cut engine
//!
//! Graphs with two terminals (source and sink) over integer capacities. Terminal capacities are
//! kept in the Boykov-Kolmogorov residual form: a single signed value per node, positive towards
//! the source and negative towards the sink, with the cancelled part accumulated as a constant
//! flow. Any engine implementing `MaxFlowGraph` can back an `Energy`; `Dinic` is the default.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::collections::VecDeque;

// -----------------------------------------------------------------------------------------------
// TYPES
// -----------------------------------------------------------------------------------------------

/// Edge capacity and flow value.
pub type Capacity = i64;

/// Index of a non-terminal node.
pub type NodeId = usize;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// Side of the minimum cut a node ends up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Source,
    Sink,
}

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

/// A two-terminal flow network that can be cut.
///
/// Implementations hold no state across cuts: a graph is built, cut once, queried, and dropped.
pub trait MaxFlowGraph: Default {
    /// Add a node with no edges.
    fn add_node(&mut self) -> NodeId;

    /// Add terminal capacities. Either may be negative, the common part is moved to the constant
    /// flow so the stored capacities stay non-negative.
    fn add_tweights(&mut self, node: NodeId, cap_source: Capacity, cap_sink: Capacity);

    /// Add a pair of directed edges `i -> j` and `j -> i`.
    fn add_edge(&mut self, i: NodeId, j: NodeId, cap: Capacity, rev_cap: Capacity);

    /// Compute the maximum flow, which includes the constant accumulated by `add_tweights`.
    fn maxflow(&mut self) -> Capacity;

    /// Side of the last computed cut. Nodes free to go either way are reported on the source side.
    fn what_segment(&self, node: NodeId) -> Segment;
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Dinic's blocking-flow algorithm over an adjacency list.
#[derive(Debug, Default)]
pub struct Dinic {
    tr_cap: Vec<Capacity>,
    edges: Vec<(NodeId, NodeId, Capacity, Capacity)>,
    flow: Capacity,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, Copy)]
struct Arc {
    to: usize,
    cap: Capacity,
}

/// Residual network. Arcs are stored in pairs, `a ^ 1` is the reverse of `a`.
struct Network {
    arcs: Vec<Arc>,
    adj: Vec<Vec<usize>>,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl MaxFlowGraph for Dinic {
    fn add_node(&mut self) -> NodeId {
        self.tr_cap.push(0);
        self.tr_cap.len() - 1
    }

    fn add_tweights(&mut self, node: NodeId, mut cap_source: Capacity, mut cap_sink: Capacity) {
        let delta = self.tr_cap[node];
        if delta > 0 {
            cap_source += delta;
        } else {
            cap_sink -= delta;
        }
        self.flow += cap_source.min(cap_sink);
        self.tr_cap[node] = cap_source - cap_sink;
    }

    fn add_edge(&mut self, i: NodeId, j: NodeId, cap: Capacity, rev_cap: Capacity) {
        debug_assert!(cap >= 0 && rev_cap >= 0, "negative edge capacity");
        if cap > 0 || rev_cap > 0 {
            self.edges.push((i, j, cap, rev_cap));
        }
    }

    fn maxflow(&mut self) -> Capacity {
        let n = self.tr_cap.len();
        let (source, sink) = (n, n + 1);

        let mut net = Network::new(n + 2);
        for (i, &tr) in self.tr_cap.iter().enumerate() {
            if tr > 0 {
                net.add(source, i, tr, 0);
            } else if tr < 0 {
                net.add(i, sink, -tr, 0);
            }
        }
        for &(i, j, cap, rev_cap) in &self.edges {
            net.add(i, j, cap, rev_cap);
        }

        let flow = net.dinic(source, sink);

        let reaches_sink = net.reaches(sink);
        self.segments = (0..n)
            .map(|i| {
                if reaches_sink[i] {
                    Segment::Sink
                } else {
                    Segment::Source
                }
            })
            .collect();

        self.flow + flow
    }

    fn what_segment(&self, node: NodeId) -> Segment {
        self.segments.get(node).copied().unwrap_or(Segment::Source)
    }
}

impl Network {
    fn new(nodes: usize) -> Self {
        Network {
            arcs: Vec::new(),
            adj: vec![Vec::new(); nodes],
        }
    }

    fn add(&mut self, i: usize, j: usize, cap: Capacity, rev_cap: Capacity) {
        self.adj[i].push(self.arcs.len());
        self.arcs.push(Arc { to: j, cap });
        self.adj[j].push(self.arcs.len());
        self.arcs.push(Arc { to: i, cap: rev_cap });
    }

    fn dinic(&mut self, source: usize, sink: usize) -> Capacity {
        let mut total = 0;

        loop {
            let level = self.levels(source);
            if level[sink] < 0 {
                return total;
            }

            let mut next = vec![0usize; self.adj.len()];
            loop {
                let pushed = self.augment(source, sink, &level, &mut next);
                if pushed == 0 {
                    break;
                }
                total += pushed;
            }
        }
    }

    /// BFS distance from the source in the residual graph, -1 when unreachable.
    fn levels(&self, source: usize) -> Vec<i32> {
        let mut level = vec![-1; self.adj.len()];
        let mut queue = VecDeque::new();
        level[source] = 0;
        queue.push_back(source);

        while let Some(u) = queue.pop_front() {
            for &a in &self.adj[u] {
                let arc = self.arcs[a];
                if arc.cap > 0 && level[arc.to] < 0 {
                    level[arc.to] = level[u] + 1;
                    queue.push_back(arc.to);
                }
            }
        }

        level
    }

    /// Push flow along one shortest augmenting path. Iterative so long paths don't grow the stack.
    fn augment(&mut self, source: usize, sink: usize, level: &[i32], next: &mut [usize]) -> Capacity {
        let mut path: Vec<usize> = Vec::new();
        let mut u = source;

        loop {
            if u == sink {
                let pushed = path
                    .iter()
                    .map(|&a| self.arcs[a].cap)
                    .min()
                    .unwrap_or(0);
                for &a in &path {
                    self.arcs[a].cap -= pushed;
                    self.arcs[a ^ 1].cap += pushed;
                }
                return pushed;
            }

            let mut advanced = false;
            while next[u] < self.adj[u].len() {
                let a = self.adj[u][next[u]];
                let arc = self.arcs[a];
                if arc.cap > 0 && level[arc.to] == level[u] + 1 {
                    path.push(a);
                    u = arc.to;
                    advanced = true;
                    break;
                }
                next[u] += 1;
            }

            if !advanced {
                // dead end, retreat one arc and skip it from now on
                match path.pop() {
                    Some(a) => {
                        u = self.arcs[a ^ 1].to;
                        next[u] += 1;
                    }
                    None => return 0,
                }
            }
        }
    }

    /// Nodes from which the sink is reachable in the residual graph.
    fn reaches(&self, sink: usize) -> Vec<bool> {
        let mut seen = vec![false; self.adj.len()];
        let mut queue = VecDeque::new();
        seen[sink] = true;
        queue.push_back(sink);

        while let Some(v) = queue.pop_front() {
            for &a in &self.adj[v] {
                // a goes v -> u, its pair goes u -> v
                let u = self.arcs[a].to;
                if !seen[u] && self.arcs[a ^ 1].cap > 0 {
                    seen[u] = true;
                    queue.push_back(u);
                }
            }
        }

        seen
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_path_bottleneck() {
        let mut g = Dinic::default();
        let a = g.add_node();
        let b = g.add_node();
        g.add_tweights(a, 5, 0);
        g.add_tweights(b, 0, 7);
        g.add_edge(a, b, 3, 0);

        assert_eq!(g.maxflow(), 3);
        assert_eq!(g.what_segment(a), Segment::Source);
        assert_eq!(g.what_segment(b), Segment::Sink);
    }

    #[test]
    fn terminal_weights_cancel_into_constant_flow() {
        let mut g = Dinic::default();
        let a = g.add_node();
        g.add_tweights(a, 4, 0);
        g.add_tweights(a, 0, 6);

        // 4 cancels immediately, 2 remains towards the sink
        assert_eq!(g.maxflow(), 4);
        assert_eq!(g.what_segment(a), Segment::Sink);
    }

    #[test]
    fn classic_network() {
        // s->0:10, s->1:10, 0->1:2, 0->2:4, 0->3:8, 1->3:9, 3->2:6, 2->t:10, 3->t:10
        let mut g = Dinic::default();
        let n: Vec<_> = (0..4).map(|_| g.add_node()).collect();
        g.add_tweights(n[0], 10, 0);
        g.add_tweights(n[1], 10, 0);
        g.add_tweights(n[2], 0, 10);
        g.add_tweights(n[3], 0, 10);
        g.add_edge(n[0], n[1], 2, 0);
        g.add_edge(n[0], n[2], 4, 0);
        g.add_edge(n[0], n[3], 8, 0);
        g.add_edge(n[1], n[3], 9, 0);
        g.add_edge(n[3], n[2], 6, 0);

        assert_eq!(g.maxflow(), 19);
    }

    #[test]
    fn free_nodes_default_to_source() {
        let mut g = Dinic::default();
        let a = g.add_node();

        assert_eq!(g.maxflow(), 0);
        assert_eq!(g.what_segment(a), Segment::Source);
    }
}
