//! Fan-in, fan-out and size rankings over the dependency graph

use serde::{Deserialize, Serialize};
use vibe_core::{DependencyEdge, EdgeKind, FileStats, ReferenceGraph};

pub const DEFAULT_HOTSPOT_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranked {
    pub path: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotReport {
    pub generated_at: String,
    pub limit: usize,
    /// Files imported by the most distinct files.
    pub fan_in: Vec<Ranked>,
    /// Files importing the most distinct files.
    pub fan_out: Vec<Ranked>,
    /// Project files referenced by the most projects.
    pub project_fan_in: Vec<Ranked>,
    /// `count` is the line count. Empty without an index.
    pub largest_files: Vec<Ranked>,
    /// `count` is the number of symbols. Empty without an index.
    pub symbol_hotspots: Vec<Ranked>,
}

/// Highest count first, ties by path; zero counts are dropped.
fn rank(mut entries: Vec<Ranked>, limit: usize) -> Vec<Ranked> {
    entries.retain(|e| e.count > 0);
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.path.cmp(&b.path)));
    entries.truncate(limit);
    entries
}

fn fan(graph: &ReferenceGraph, count: impl Fn(&str) -> usize, limit: usize) -> Vec<Ranked> {
    let entries = graph
        .nodes()
        .into_iter()
        .map(|path| Ranked { path: path.to_string(), count: count(path) })
        .collect();
    rank(entries, limit)
}

pub fn find_hotspots(
    coarse: &[DependencyEdge],
    code: &[DependencyEdge],
    stats: &[FileStats],
    limit: usize,
) -> HotspotReport {
    let imports = ReferenceGraph::from_edges(code.iter().filter(|e| !e.kind.is_coarse()));
    let projects = ReferenceGraph::from_edges(coarse.iter().filter(|e| e.kind == EdgeKind::ProjectRef));

    HotspotReport {
        generated_at: chrono::Utc::now().to_rfc3339(),
        limit,
        fan_in: fan(&imports, |p| imports.fan_in(p), limit),
        fan_out: fan(&imports, |p| imports.fan_out(p), limit),
        project_fan_in: fan(&projects, |p| projects.fan_in(p), limit),
        largest_files: rank(
            stats.iter().map(|s| Ranked { path: s.path.clone(), count: s.line_count as usize }).collect(),
            limit,
        ),
        symbol_hotspots: rank(
            stats.iter().map(|s| Ranked { path: s.path.clone(), count: s.symbols }).collect(),
            limit,
        ),
    }
}
