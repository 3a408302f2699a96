//! Cycle report over the coarse reference graph

use serde::{Deserialize, Serialize};
use tracing::debug;
use vibe_core::{DependencyEdge, ReferenceGraph};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub generated_at: String,
    pub nodes: usize,
    pub edges: usize,
    /// One witness cycle, closed (first == last), or None for a DAG.
    pub cycle: Option<Vec<String>>,
}

impl CycleReport {
    pub fn has_cycle(&self) -> bool {
        self.cycle.is_some()
    }
}

pub fn detect_cycles(edges: &[DependencyEdge]) -> CycleReport {
    let graph = ReferenceGraph::from_edges(edges);
    let cycle = graph.find_cycle();
    debug!(
        "Cycle check over {} nodes / {} edges: {}",
        graph.node_count(),
        graph.edge_count(),
        if cycle.is_some() { "cycle found" } else { "acyclic" }
    );
    CycleReport {
        generated_at: chrono::Utc::now().to_rfc3339(),
        nodes: graph.node_count(),
        edges: graph.edge_count(),
        cycle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vibe_core::EdgeKind;

    fn refs(pairs: &[(&str, &str)]) -> Vec<DependencyEdge> {
        pairs.iter().map(|(a, b)| DependencyEdge::new(*a, *b, EdgeKind::ProjectRef)).collect()
    }

    #[test]
    fn test_acyclic_projects() {
        let report = detect_cycles(&refs(&[("App.csproj", "Core.csproj"), ("Data.csproj", "Core.csproj")]));
        assert!(!report.has_cycle());
        assert_eq!(report.nodes, 3);
        assert_eq!(report.edges, 2);
    }

    #[test]
    fn test_cycle_witness() {
        let edges = refs(&[("a", "b"), ("b", "c"), ("c", "b")]);
        let report = detect_cycles(&edges);
        let cycle = report.cycle.unwrap();
        assert_eq!(cycle.first(), cycle.last());
        for pair in cycle.windows(2) {
            assert!(edges.iter().any(|e| e.from == pair[0] && e.to == pair[1]));
        }
    }

    #[test]
    fn test_empty_graph() {
        let report = detect_cycles(&[]);
        assert_eq!(report.nodes, 0);
        assert!(report.cycle.is_none());
    }
}
