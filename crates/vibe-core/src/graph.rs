//! Reference graph using petgraph::StableDiGraph keyed by file path

use std::collections::{BTreeSet, HashMap, VecDeque};

use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;

use crate::model::{DependencyEdge, EdgeKind};

/// Project/solution reference graph. Nodes are file paths, looked up through
/// an index map; petgraph owns the arena.
pub struct ReferenceGraph {
    inner: StableDiGraph<String, EdgeKind>,
    index: HashMap<String, NodeIndex>,
}

impl std::fmt::Debug for ReferenceGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceGraph")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    OnStack,
    Done,
}

impl ReferenceGraph {
    pub fn new() -> Self {
        ReferenceGraph {
            inner: StableDiGraph::new(),
            index: HashMap::new(),
        }
    }

    /// Build a graph from stored edges.
    pub fn from_edges<'a>(edges: impl IntoIterator<Item = &'a DependencyEdge>) -> Self {
        let mut graph = Self::new();
        for edge in edges {
            graph.add_edge(&edge.from, &edge.to, edge.kind);
        }
        graph
    }

    /// Add a node if missing. Returns its index.
    pub fn add_node(&mut self, path: &str) -> NodeIndex {
        if let Some(idx) = self.index.get(path) {
            return *idx;
        }
        let idx = self.inner.add_node(path.to_string());
        self.index.insert(path.to_string(), idx);
        idx
    }

    pub fn add_edge(&mut self, from: &str, to: &str, kind: EdgeKind) {
        let source = self.add_node(from);
        let target = self.add_node(to);
        self.inner.add_edge(source, target, kind);
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Distinct nodes referencing `path`.
    pub fn fan_in(&self, path: &str) -> usize {
        self.neighbors(path, Direction::Incoming).len()
    }

    /// Distinct nodes referenced by `path`.
    pub fn fan_out(&self, path: &str) -> usize {
        self.neighbors(path, Direction::Outgoing).len()
    }

    /// Nodes referenced by `path`, sorted.
    pub fn successors(&self, path: &str) -> Vec<&str> {
        self.neighbors(path, Direction::Outgoing)
            .into_iter()
            .filter_map(|idx| self.inner.node_weight(idx).map(String::as_str))
            .collect()
    }

    /// All node paths, sorted.
    pub fn nodes(&self) -> Vec<&str> {
        let mut nodes: Vec<&str> = self.inner.node_weights().map(String::as_str).collect();
        nodes.sort_unstable();
        nodes
    }

    /// Every node that reaches `path` through one or more edges, with its
    /// shortest distance. Ordered by distance, then path; `path` itself is
    /// left out even when it sits on a cycle.
    pub fn dependents(&self, path: &str) -> Vec<(String, usize)> {
        let Some(&start) = self.index.get(path) else {
            return Vec::new();
        };
        let mut depth: HashMap<NodeIndex, usize> = HashMap::from([(start, 0)]);
        let mut queue = VecDeque::from([start]);
        let mut found = Vec::new();
        while let Some(node) = queue.pop_front() {
            let next_depth = depth[&node] + 1;
            for source in self.sorted_neighbors(node, Direction::Incoming) {
                if depth.contains_key(&source) {
                    continue;
                }
                depth.insert(source, next_depth);
                found.push((self.name(source), next_depth));
                queue.push_back(source);
            }
        }
        found.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        found
    }

    fn neighbors(&self, path: &str, direction: Direction) -> Vec<NodeIndex> {
        let Some(&idx) = self.index.get(path) else {
            return Vec::new();
        };
        self.sorted_neighbors(idx, direction)
    }

    fn sorted_neighbors(&self, idx: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        let unique: BTreeSet<(&str, NodeIndex)> = self
            .inner
            .edges_directed(idx, direction)
            .filter_map(|edge_ref| {
                let other = match direction {
                    Direction::Outgoing => edge_ref.target(),
                    Direction::Incoming => edge_ref.source(),
                };
                self.inner.node_weight(other).map(|name| (name.as_str(), other))
            })
            .collect();
        unique.into_iter().map(|(_, idx)| idx).collect()
    }

    fn name(&self, idx: NodeIndex) -> String {
        self.inner.node_weight(idx).cloned().unwrap_or_default()
    }

    /// Find one witness cycle, if any.
    ///
    /// Iterative three-state DFS over nodes in path order. The returned
    /// sequence is closed: its first and last elements are the same node and
    /// each consecutive pair is an edge of the graph.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut roots: Vec<(&str, NodeIndex)> = self
            .inner
            .node_indices()
            .filter_map(|idx| self.inner.node_weight(idx).map(|n| (n.as_str(), idx)))
            .collect();
        roots.sort();

        let mut state: HashMap<NodeIndex, Visit> = HashMap::new();
        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();

        for (_, root) in roots {
            if state.contains_key(&root) {
                continue;
            }
            state.insert(root, Visit::OnStack);
            let mut stack = vec![(root, self.sorted_neighbors(root, Direction::Outgoing), 0usize)];

            while let Some((current, neighbors, pos)) = stack.last_mut() {
                let current = *current;
                if *pos >= neighbors.len() {
                    state.insert(current, Visit::Done);
                    stack.pop();
                    continue;
                }
                let next = neighbors[*pos];
                *pos += 1;

                match state.get(&next) {
                    None => {
                        parent.insert(next, current);
                        state.insert(next, Visit::OnStack);
                        stack.push((next, self.sorted_neighbors(next, Direction::Outgoing), 0));
                    }
                    Some(Visit::OnStack) => {
                        return Some(self.reconstruct(current, next, &parent));
                    }
                    Some(Visit::Done) => {}
                }
            }
        }
        None
    }

    /// Walk parents from `from` back to `to`, then close the loop.
    fn reconstruct(
        &self,
        from: NodeIndex,
        to: NodeIndex,
        parent: &HashMap<NodeIndex, NodeIndex>,
    ) -> Vec<String> {
        let mut chain = vec![from];
        let mut node = from;
        while node != to {
            match parent.get(&node) {
                Some(&p) => {
                    chain.push(p);
                    node = p;
                }
                None => break,
            }
        }
        chain.reverse();
        chain.push(to);
        chain.into_iter().map(|idx| self.name(idx)).collect()
    }
}

impl Default for ReferenceGraph {
    fn default() -> Self {
        Self::new()
    }
}
