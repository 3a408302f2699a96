//! Change coupling mined from commit history
//!
//! Files (or directories, when grouped) that change in the same commits are
//! coupled. Pair counts give a Jaccard strength per pair; strong pairs form
//! clusters, and weak pairs that cross clusters are reported as leaks and
//! hubs. The analysis is pure: the same commits always give the same report.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;
use vibe_core::{CouplingConfig, FileSelector, GroupBy};

use crate::playbook::{Playbook, playbooks_for};

/// Rows kept in the per-node table.
const NODE_ROWS: usize = 200;

/// Internal pairs listed per cluster.
const CLUSTER_TOP_PAIRS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub added: u64,
    pub deleted: u64,
}

impl FileChange {
    pub fn new(path: impl Into<String>) -> Self {
        FileChange { path: path.into(), added: 0, deleted: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: String,
    pub files: Vec<FileChange>,
}

impl Commit {
    pub fn churn(&self) -> u64 {
        self.files.iter().map(|f| f.added + f.deleted).sum()
    }
}

/// Old path to new path links collected from rename records.
#[derive(Debug, Clone, Default)]
pub struct RenameMap {
    links: HashMap<String, String>,
}

impl RenameMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, old: impl Into<String>, new: impl Into<String>) {
        let (old, new) = (old.into(), new.into());
        if old != new {
            self.links.insert(old, new);
        }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Latest known name of `path`. Rename loops stop at the first repeat.
    pub fn canonical(&self, path: &str) -> String {
        let mut current = path;
        let mut visited: HashSet<&str> = HashSet::new();
        while let Some(next) = self.links.get(current) {
            if !visited.insert(current) {
                break;
            }
            current = next;
        }
        current.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoChangeEdge {
    pub a: String,
    pub b: String,
    pub count: u32,
    pub jaccard: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: usize,
    pub nodes: Vec<String>,
    pub internal_edges: usize,
    pub internal_count_sum: u64,
    pub internal_jaccard_avg: f64,
    pub top_internal_pairs: Vec<CoChangeEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryLeak {
    pub a: String,
    pub b: String,
    pub count: u32,
    pub jaccard: f64,
    pub cluster_a: usize,
    pub cluster_b: usize,
    pub playbooks: Vec<Playbook>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hub {
    pub node: String,
    pub cluster: usize,
    pub commits: u32,
    pub sum_couplings: u64,
    pub connected_clusters: Vec<usize>,
    pub cross_edge_count_sum: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStat {
    pub node: String,
    pub commits: u32,
    pub sum_couplings: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouplingReport {
    pub generated_at: String,
    /// Set when history could not be read; all other fields are then empty.
    pub skipped: Option<String>,
    pub commits_seen: usize,
    pub commits_analyzed: usize,
    pub skipped_large_commits: usize,
    pub skipped_churn_commits: usize,
    pub min_jaccard: f64,
    pub pairs: Vec<CoChangeEdge>,
    pub nodes: Vec<NodeStat>,
    pub clusters: Vec<Cluster>,
    pub boundary_leaks: Vec<BoundaryLeak>,
    pub hubs: Vec<Hub>,
}

impl CouplingReport {
    fn empty(min_jaccard: f64) -> Self {
        CouplingReport {
            generated_at: chrono::Utc::now().to_rfc3339(),
            skipped: None,
            commits_seen: 0,
            commits_analyzed: 0,
            skipped_large_commits: 0,
            skipped_churn_commits: 0,
            min_jaccard,
            pairs: Vec::new(),
            nodes: Vec::new(),
            clusters: Vec::new(),
            boundary_leaks: Vec::new(),
            hubs: Vec::new(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        let mut report = Self::empty(0.0);
        report.skipped = Some(reason.into());
        report
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }
}

/// Raw tallies over the kept commits.
#[derive(Default)]
struct Tally {
    file_commits: BTreeMap<String, u32>,
    pair_counts: BTreeMap<(String, String), u32>,
    analyzed: usize,
    skipped_large: usize,
    skipped_churn: usize,
}

fn rank_edges(a: &CoChangeEdge, b: &CoChangeEdge) -> Ordering {
    b.count
        .cmp(&a.count)
        .then(b.jaccard.total_cmp(&a.jaccard))
        .then_with(|| a.a.cmp(&b.a))
        .then_with(|| a.b.cmp(&b.b))
}

fn cap<T>(items: &mut Vec<T>, max: usize) {
    if max > 0 {
        items.truncate(max);
    }
}

pub struct CouplingAnalyzer {
    config: CouplingConfig,
    selector: Option<FileSelector>,
}

impl CouplingAnalyzer {
    pub fn new(config: CouplingConfig) -> Self {
        CouplingAnalyzer { config, selector: None }
    }

    /// Only count paths the selector accepts.
    pub fn with_selector(mut self, selector: FileSelector) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn config(&self) -> &CouplingConfig {
        &self.config
    }

    /// Map a history path to its node, or None when out of scope.
    fn node_for(&self, raw: &str) -> Option<String> {
        let path = raw.trim().replace('\\', "/");
        let path = path.strip_prefix("./").unwrap_or(&path);
        if path.is_empty() || path.starts_with('/') {
            return None;
        }
        if let Some(selector) = &self.selector {
            if !selector.matches(path) {
                return None;
            }
        }
        Some(match self.config.group_by {
            GroupBy::File => path.to_string(),
            GroupBy::Dir => group_dir(path, self.config.dir_depth),
        })
    }

    fn tally(&self, commits: &[Commit]) -> Tally {
        let mut tally = Tally::default();
        for commit in commits {
            let mut nodes: BTreeSet<String> = BTreeSet::new();
            let mut churn = 0u64;
            for change in &commit.files {
                if let Some(node) = self.node_for(&change.path) {
                    nodes.insert(node);
                    churn += change.added + change.deleted;
                }
            }
            if nodes.is_empty() {
                continue;
            }
            if self.config.max_churn_per_commit > 0 && churn > self.config.max_churn_per_commit {
                debug!("Skipping commit {} with churn {}", commit.id, churn);
                tally.skipped_churn += 1;
                continue;
            }
            if self.config.max_files_per_commit > 0 && nodes.len() > self.config.max_files_per_commit {
                debug!("Skipping commit {} touching {} nodes", commit.id, nodes.len());
                tally.skipped_large += 1;
                continue;
            }

            tally.analyzed += 1;
            let nodes: Vec<String> = nodes.into_iter().collect();
            for node in &nodes {
                *tally.file_commits.entry(node.clone()).or_default() += 1;
            }
            for (i, a) in nodes.iter().enumerate() {
                for b in &nodes[i + 1..] {
                    *tally.pair_counts.entry((a.clone(), b.clone())).or_default() += 1;
                }
            }
        }
        tally
    }

    fn edges(&self, tally: &Tally) -> Vec<CoChangeEdge> {
        let mut edges: Vec<CoChangeEdge> = tally
            .pair_counts
            .iter()
            .filter(|(_, count)| **count >= self.config.min_pair_count)
            .map(|((a, b), &count)| {
                let ca = tally.file_commits.get(a).copied().unwrap_or(0);
                let cb = tally.file_commits.get(b).copied().unwrap_or(0);
                CoChangeEdge { a: a.clone(), b: b.clone(), count, jaccard: jaccard(count, ca, cb) }
            })
            .collect();
        edges.sort_by(rank_edges);
        edges
    }

    /// Commits must already carry canonical paths (see `history::parse_numstat`).
    pub fn analyze(&self, commits: &[Commit]) -> CouplingReport {
        let tally = self.tally(commits);
        let edges = self.edges(&tally);
        let (strong, weak): (Vec<&CoChangeEdge>, Vec<&CoChangeEdge>) =
            edges.iter().partition(|e| e.jaccard >= self.config.min_jaccard);

        let mut sum_couplings: HashMap<&str, u64> = HashMap::new();
        for ((a, b), &count) in &tally.pair_counts {
            *sum_couplings.entry(a).or_default() += u64::from(count);
            *sum_couplings.entry(b).or_default() += u64::from(count);
        }

        let clusters = self.clusters(&strong);
        let node_cluster: HashMap<&str, usize> = clusters
            .iter()
            .flat_map(|c| c.nodes.iter().map(move |n| (n.as_str(), c.id)))
            .collect();
        let boundary_leaks = self.leaks(&weak, &node_cluster);
        let hubs = self.hubs(&weak, &node_cluster, &tally.file_commits, &sum_couplings);

        let mut nodes: Vec<NodeStat> = tally
            .file_commits
            .iter()
            .map(|(node, &commits)| NodeStat {
                node: node.clone(),
                commits,
                sum_couplings: sum_couplings.get(node.as_str()).copied().unwrap_or(0),
            })
            .collect();
        nodes.sort_by(|a, b| {
            b.sum_couplings
                .cmp(&a.sum_couplings)
                .then(b.commits.cmp(&a.commits))
                .then_with(|| a.node.cmp(&b.node))
        });
        nodes.truncate(NODE_ROWS);

        let mut pairs = edges.clone();
        cap(&mut pairs, self.config.top);

        debug!(
            "Coupling: {} commits analyzed, {} edges ({} strong), {} clusters",
            tally.analyzed,
            edges.len(),
            strong.len(),
            clusters.len()
        );

        CouplingReport {
            commits_seen: commits.len(),
            commits_analyzed: tally.analyzed,
            skipped_large_commits: tally.skipped_large,
            skipped_churn_commits: tally.skipped_churn,
            pairs,
            nodes,
            clusters,
            boundary_leaks,
            hubs,
            ..CouplingReport::empty(self.config.min_jaccard)
        }
    }

    /// Connected components of the strong edges, ranked and numbered.
    fn clusters(&self, strong: &[&CoChangeEdge]) -> Vec<Cluster> {
        let mut adjacency: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (idx, &edge) in strong.iter().enumerate() {
            adjacency.entry(&edge.a).or_default().push(idx);
            adjacency.entry(&edge.b).or_default().push(idx);
        }

        let min_size = self.config.min_cluster_size.max(2);
        let mut visited: HashSet<&str> = HashSet::new();
        let mut found = Vec::new();

        for &start in adjacency.keys() {
            if !visited.insert(start) {
                continue;
            }
            let mut stack = vec![start];
            let mut nodes: BTreeSet<&str> = BTreeSet::new();
            let mut edge_ids: BTreeSet<usize> = BTreeSet::new();
            while let Some(current) = stack.pop() {
                nodes.insert(current);
                for &idx in adjacency.get(current).map(Vec::as_slice).unwrap_or_default() {
                    edge_ids.insert(idx);
                    let edge = strong[idx];
                    let other = if edge.a == current { edge.b.as_str() } else { edge.a.as_str() };
                    if visited.insert(other) {
                        stack.push(other);
                    }
                }
            }
            if nodes.len() < min_size {
                continue;
            }

            let mut internal: Vec<CoChangeEdge> = edge_ids.iter().map(|&i| strong[i].clone()).collect();
            internal.sort_by(rank_edges);
            let internal_count_sum = internal.iter().map(|e| u64::from(e.count)).sum();
            let internal_jaccard_avg = if internal.is_empty() {
                0.0
            } else {
                internal.iter().map(|e| e.jaccard).sum::<f64>() / internal.len() as f64
            };
            found.push(Cluster {
                id: 0,
                nodes: nodes.into_iter().map(str::to_string).collect(),
                internal_edges: internal.len(),
                internal_count_sum,
                internal_jaccard_avg,
                top_internal_pairs: internal.into_iter().take(CLUSTER_TOP_PAIRS).collect(),
            });
        }

        found.sort_by(|a, b| {
            b.internal_count_sum
                .cmp(&a.internal_count_sum)
                .then(b.internal_edges.cmp(&a.internal_edges))
                .then(b.nodes.len().cmp(&a.nodes.len()))
                .then(b.internal_jaccard_avg.total_cmp(&a.internal_jaccard_avg))
                .then_with(|| a.nodes.cmp(&b.nodes))
        });
        cap(&mut found, self.config.max_clusters);
        for (idx, cluster) in found.iter_mut().enumerate() {
            cluster.id = idx + 1;
        }
        found
    }

    fn leaks(&self, weak: &[&CoChangeEdge], node_cluster: &HashMap<&str, usize>) -> Vec<BoundaryLeak> {
        let mut leaks: Vec<BoundaryLeak> = weak
            .iter()
            .filter_map(|edge| {
                let ca = *node_cluster.get(edge.a.as_str())?;
                let cb = *node_cluster.get(edge.b.as_str())?;
                (ca != cb).then(|| BoundaryLeak {
                    a: edge.a.clone(),
                    b: edge.b.clone(),
                    count: edge.count,
                    jaccard: edge.jaccard,
                    cluster_a: ca,
                    cluster_b: cb,
                    playbooks: playbooks_for(&edge.a, &edge.b),
                })
            })
            .collect();
        leaks.sort_by(|x, y| {
            y.count
                .cmp(&x.count)
                .then(y.jaccard.total_cmp(&x.jaccard))
                .then_with(|| x.a.cmp(&y.a))
                .then_with(|| x.b.cmp(&y.b))
        });
        cap(&mut leaks, self.config.max_boundary_leaks);
        leaks
    }

    fn hubs(
        &self,
        weak: &[&CoChangeEdge],
        node_cluster: &HashMap<&str, usize>,
        file_commits: &BTreeMap<String, u32>,
        sum_couplings: &HashMap<&str, u64>,
    ) -> Vec<Hub> {
        let mut weak_adjacency: HashMap<&str, Vec<&CoChangeEdge>> = HashMap::new();
        for &edge in weak {
            weak_adjacency.entry(&edge.a).or_default().push(edge);
            weak_adjacency.entry(&edge.b).or_default().push(edge);
        }

        let mut hubs = Vec::new();
        for (&node, &own) in node_cluster {
            let mut connected: BTreeSet<usize> = BTreeSet::new();
            let mut cross = 0u64;
            for edge in weak_adjacency.get(node).map(Vec::as_slice).unwrap_or_default() {
                let other = if edge.a == node { &edge.b } else { &edge.a };
                match node_cluster.get(other.as_str()) {
                    Some(&cluster) if cluster != own => {
                        connected.insert(cluster);
                        cross += u64::from(edge.count);
                    }
                    _ => {}
                }
            }
            if connected.is_empty() {
                continue;
            }
            hubs.push(Hub {
                node: node.to_string(),
                cluster: own,
                commits: file_commits.get(node).copied().unwrap_or(0),
                sum_couplings: sum_couplings.get(node).copied().unwrap_or(0),
                connected_clusters: connected.into_iter().collect(),
                cross_edge_count_sum: cross,
            });
        }
        hubs.sort_by(|a, b| {
            b.connected_clusters
                .len()
                .cmp(&a.connected_clusters.len())
                .then(b.cross_edge_count_sum.cmp(&a.cross_edge_count_sum))
                .then(b.sum_couplings.cmp(&a.sum_couplings))
                .then(b.commits.cmp(&a.commits))
                .then_with(|| a.node.cmp(&b.node))
        });
        cap(&mut hubs, self.config.max_hubs);
        hubs
    }
}

/// `pair / (ca + cb - pair)`, 0 when the union is empty.
pub fn jaccard(pair: u32, ca: u32, cb: u32) -> f64 {
    let union = i64::from(ca) + i64::from(cb) - i64::from(pair);
    if union <= 0 {
        0.0
    } else {
        f64::from(pair) / union as f64
    }
}

/// Directory node for a path: `.` for root files, else the first `depth` parts.
fn group_dir(path: &str, depth: usize) -> String {
    let parts: Vec<&str> = path.split('/').collect();
    let dirs = &parts[..parts.len() - 1];
    if dirs.is_empty() {
        return ".".to_string();
    }
    dirs[..depth.clamp(1, dirs.len())].join("/")
}
