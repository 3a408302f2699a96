//! Reverse-dependency impact of changing one file

use serde::{Deserialize, Serialize};
use tracing::debug;
use vibe_core::{DependencyEdge, ReferenceGraph};

pub const DEFAULT_IMPACT_LIMIT: usize = 40;

/// Scores above this suggest taking a checkpoint before editing.
pub const CHECKPOINT_RISK: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactedFile {
    pub path: String,
    /// Edges between this file and the target; 1 means a direct dependent.
    pub depth: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactReport {
    pub generated_at: String,
    pub target: String,
    pub critical: bool,
    pub direct: usize,
    pub total: usize,
    pub risk_score: usize,
    pub truncated: bool,
    /// Nearest dependents first, at most `limit` of them.
    pub impacted: Vec<ImpactedFile>,
}

impl ImpactReport {
    pub fn needs_checkpoint(&self) -> bool {
        self.risk_score > CHECKPOINT_RISK
    }
}

/// Two points per impacted file, times five when the target holds critical code.
pub fn risk_score(impacted: usize, critical: bool) -> usize {
    let score = impacted.saturating_mul(2);
    if critical { score.saturating_mul(5) } else { score }
}

/// Files that reach `target` through code or project edges.
pub fn analyze_impact(target: &str, edges: &[DependencyEdge], critical: bool, limit: usize) -> ImpactReport {
    let graph = ReferenceGraph::from_edges(edges);
    let dependents = graph.dependents(target);
    debug!("{} has {} dependents in a graph of {} nodes", target, dependents.len(), graph.node_count());

    let total = dependents.len();
    let direct = dependents.iter().filter(|(_, depth)| *depth == 1).count();
    let impacted: Vec<ImpactedFile> = dependents
        .into_iter()
        .take(limit)
        .map(|(path, depth)| ImpactedFile { path, depth })
        .collect();

    ImpactReport {
        generated_at: chrono::Utc::now().to_rfc3339(),
        target: target.to_string(),
        critical,
        direct,
        total,
        risk_score: risk_score(total, critical),
        truncated: total > impacted.len(),
        impacted,
    }
}
