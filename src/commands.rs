//! CLI command implementations

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use tracing::{info, warn};
use vibe_analysis::{
    BoundaryEngine, BoundaryReport, CouplingAnalyzer, CouplingReport, HistoryOptions, HistoryOutcome,
    analyze_impact, detect_cycles, find_hotspots, load_history,
};
use vibe_core::{DependencyEdge, FileStats, Store, VibeConfig, index_db_path, save_report};
use vibe_indexer::Coordinator;
use vibe_indexer::walk::rel_path;
use vibe_watcher::WatcherService;

/// How `boundaries` turns its outcome into an exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitPolicy {
    /// Violations fail the run.
    Strict,
    /// Nothing fails the run.
    BestEffort,
    /// Only engine errors fail the run.
    Default,
}

impl ExitPolicy {
    /// `--strict` wins over `--best-effort`.
    pub fn from_flags(strict: bool, best_effort: bool) -> Self {
        if strict {
            ExitPolicy::Strict
        } else if best_effort {
            ExitPolicy::BestEffort
        } else {
            ExitPolicy::Default
        }
    }

    fn fails_on_violations(self) -> bool {
        self == ExitPolicy::Strict
    }

    fn fails_on_error(self) -> bool {
        self != ExitPolicy::BestEffort
    }
}

fn repo_root(root: &Path) -> anyhow::Result<PathBuf> {
    root.canonicalize()
        .with_context(|| format!("repository root {} not found", root.display()))
}

fn open_index(root: &Path) -> anyhow::Result<Store> {
    if !index_db_path(root).exists() {
        anyhow::bail!("no index at {}; run `vibe index` first", index_db_path(root).display());
    }
    Store::open_for_repo(root)
}

/// Coarse and code edges from the index, or from a one-shot resolution when
/// nothing has been indexed yet.
fn load_edges(root: &Path, config: &VibeConfig) -> anyhow::Result<(Vec<DependencyEdge>, Vec<DependencyEdge>)> {
    if index_db_path(root).exists() {
        let store = Store::open_for_repo(root)?;
        if store.counts()?.files > 0 {
            return Ok((store.coarse_edges()?, store.code_edges()?));
        }
    }
    info!("Index is empty, resolving dependencies directly");
    let resolved = Coordinator::new(root, config.clone()).resolve_all()?;
    Ok((resolved.coarse, resolved.code))
}

/// Per-file stats from the index; empty when nothing has been indexed.
fn load_stats(root: &Path) -> anyhow::Result<Vec<FileStats>> {
    if !index_db_path(root).exists() {
        return Ok(Vec::new());
    }
    Store::open_for_repo(root)?.file_stats()
}

pub fn index(root: &Path) -> anyhow::Result<ExitCode> {
    let root = repo_root(root)?;
    info!("Indexing repository: {}", root.display());

    let config = VibeConfig::load(&root)?;
    let mut store = Store::open_for_repo(&root)?;
    let report = Coordinator::new(&root, config).scan_all(&mut store)?;
    let counts = store.counts()?;

    info!(
        "Indexed {} files ({} changed, {} removed, {} failed): {} symbols, {} edges",
        report.scanned, report.changed, report.removed, report.failed, counts.symbols, counts.edges
    );
    Ok(ExitCode::SUCCESS)
}

pub fn index_file(root: &Path, path: &Path) -> anyhow::Result<ExitCode> {
    let root = repo_root(root)?;
    let config = VibeConfig::load(&root)?;
    let mut store = Store::open_for_repo(&root)?;
    let target = if path.is_absolute() { path.to_path_buf() } else { root.join(path) };

    if Coordinator::new(&root, config).index_file(&mut store, &target)? {
        info!("Updated index for {}", path.display());
    } else {
        info!("No change for {}", path.display());
    }
    Ok(ExitCode::SUCCESS)
}

fn run_boundaries(root: &Path, max_violations: usize) -> anyhow::Result<BoundaryReport> {
    let root = repo_root(root)?;
    let config = VibeConfig::load(&root)?;
    let (coarse, code) = load_edges(&root, &config)?;

    let report = BoundaryEngine::new(&config.architecture, max_violations).check(&coarse, &code);
    let path = save_report(&root, "boundaries.json", &report)?;

    for violation in &report.violations {
        warn!(
            "[{}] {} -> {} ({}{})",
            violation.rule,
            violation.from,
            violation.to,
            violation.kind,
            violation.line.map(|l| format!(", line {}", l)).unwrap_or_default()
        );
    }
    info!(
        "{} violations across {} edges{} (report: {})",
        report.violations.len(),
        report.edges_checked,
        if report.truncated { ", truncated" } else { "" },
        path.display()
    );
    Ok(report)
}

pub fn boundaries(root: &Path, policy: ExitPolicy, max_violations: usize) -> anyhow::Result<ExitCode> {
    match run_boundaries(root, max_violations) {
        Ok(report) if report.has_violations() && policy.fails_on_violations() => Ok(ExitCode::FAILURE),
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(e) if policy.fails_on_error() => Err(e),
        Err(e) => {
            warn!("Boundary check failed: {:#}", e);
            Ok(ExitCode::SUCCESS)
        }
    }
}

pub async fn coupling(root: &Path, max_commits: Option<usize>, since: Option<String>) -> anyhow::Result<ExitCode> {
    let root = repo_root(root)?;
    let config = VibeConfig::load(&root)?;
    let mut settings = config.coupling.clone();
    if let Some(max_commits) = max_commits {
        settings.max_commits = max_commits;
    }
    if since.is_some() {
        settings.since = since;
    }

    let report = match load_history(&root, &HistoryOptions::from(&settings)).await {
        HistoryOutcome::Loaded { commits, .. } => {
            let (selector, _) = config.selector();
            CouplingAnalyzer::new(settings).with_selector(selector).analyze(&commits)
        }
        HistoryOutcome::Skipped { reason } => CouplingReport::skipped(reason),
    };
    let path = save_report(&root, "change_coupling.json", &report)?;

    match &report.skipped {
        Some(reason) => info!("Change coupling skipped: {}", reason),
        None => info!(
            "{} commits analyzed: {} pairs, {} clusters, {} leaks, {} hubs (report: {})",
            report.commits_analyzed,
            report.pairs.len(),
            report.clusters.len(),
            report.boundary_leaks.len(),
            report.hubs.len(),
            path.display()
        ),
    }
    Ok(ExitCode::SUCCESS)
}

pub fn cycles(root: &Path) -> anyhow::Result<ExitCode> {
    let root = repo_root(root)?;
    let config = VibeConfig::load(&root)?;
    let (coarse, _) = load_edges(&root, &config)?;

    let report = detect_cycles(&coarse);
    let path = save_report(&root, "cycles.json", &report)?;
    match &report.cycle {
        Some(cycle) => warn!("Reference cycle: {}", cycle.join(" -> ")),
        None => info!("No reference cycles among {} projects", report.nodes),
    }
    info!("Report: {}", path.display());
    Ok(ExitCode::SUCCESS)
}

pub fn hotspots(root: &Path, limit: usize) -> anyhow::Result<ExitCode> {
    let root = repo_root(root)?;
    let config = VibeConfig::load(&root)?;
    let (coarse, code) = load_edges(&root, &config)?;
    let stats = load_stats(&root)?;

    let report = find_hotspots(&coarse, &code, &stats, limit);
    let path = save_report(&root, "hotspots.json", &report)?;

    let sections = [
        ("Fan-in", &report.fan_in),
        ("Fan-out", &report.fan_out),
        ("Project fan-in", &report.project_fan_in),
        ("Largest files (lines)", &report.largest_files),
        ("Most symbols", &report.symbol_hotspots),
    ];
    for (title, entries) in sections {
        if entries.is_empty() {
            continue;
        }
        println!("{}:", title);
        for entry in entries.iter().take(5) {
            println!("  {}: {}", entry.path, entry.count);
        }
    }
    info!("Report: {}", path.display());
    Ok(ExitCode::SUCCESS)
}

pub fn impact(root: &Path, target: &Path, limit: usize) -> anyhow::Result<ExitCode> {
    let root = repo_root(root)?;
    let absolute = if target.is_absolute() { target.to_path_buf() } else { root.join(target) };
    let Some(rel) = rel_path(&root, &absolute) else {
        anyhow::bail!("{} is outside {}", target.display(), root.display());
    };

    let config = VibeConfig::load(&root)?;
    let (coarse, code) = load_edges(&root, &config)?;
    let critical = load_stats(&root)?.iter().any(|s| s.path == rel && s.critical);
    let edges: Vec<DependencyEdge> = coarse.into_iter().chain(code).collect();

    let report = analyze_impact(&rel, &edges, critical, limit);
    let path = save_report(&root, "impact.json", &report)?;

    println!("Impact for: {}", report.target);
    println!("  impacted files: {} ({} direct)", report.total, report.direct);
    println!("  critical: {}", report.critical);
    println!("  risk score: {}", report.risk_score);
    if report.needs_checkpoint() {
        println!("  consider a checkpoint before large changes");
    }
    for file in &report.impacted {
        println!("  {} (depth {})", file.path, file.depth);
    }
    info!("Report: {}", path.display());
    Ok(ExitCode::SUCCESS)
}

pub fn search(root: &Path, query: &str, limit: usize) -> anyhow::Result<ExitCode> {
    let root = repo_root(root)?;
    let store = open_index(&root)?;
    let hits = store.search(query, limit)?;
    if hits.is_empty() {
        info!("No matches for {:?}", query);
    }
    for hit in hits {
        let line = hit.line.map(|l| format!(":{}", l)).unwrap_or_default();
        match hit.symbol {
            Some(symbol) => println!("{}{}  {}", hit.path, line, symbol),
            None => println!("{}{}", hit.path, line),
        }
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn watch(root: &Path) -> anyhow::Result<ExitCode> {
    let root = repo_root(root)?;
    let config = VibeConfig::load(&root)?;
    let coordinator = Coordinator::new(&root, config);
    let mut store = Store::open_for_repo(&root)?;
    let report = coordinator.scan_all(&mut store)?;
    info!("Initial sweep: {} files, {} changed", report.scanned, report.changed);

    let mut service = WatcherService::new(coordinator, store)?;
    tokio::select! {
        result = service.run(|summary| {
            info!(
                "Re-indexed {} of {} paths: {} files, {} symbols, {} edges",
                summary.changed, summary.flushed, summary.counts.files, summary.counts.symbols, summary.counts.edges
            );
        }) => result?,
        _ = tokio::signal::ctrl_c() => info!("Stopping watcher"),
    }
    Ok(ExitCode::SUCCESS)
}

pub fn clear(root: &Path) -> anyhow::Result<ExitCode> {
    let root = repo_root(root)?;
    info!("Clearing index for: {}", root.display());

    vibe_core::clear_index(&root)?;

    info!("Index cleared");
    Ok(ExitCode::SUCCESS)
}
