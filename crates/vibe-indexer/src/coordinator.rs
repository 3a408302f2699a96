//! Index sweeps: walk, detect changes, extract, resolve, persist
//!
//! Reading, hashing, extraction and resolution run on the rayon pool, one
//! chunk of files at a time. Finished chunks flow through a bounded channel to
//! the calling thread, which writes them in path order, one transaction per
//! file, so only a few chunks of file contents are held at once.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::UNIX_EPOCH;

use anyhow::Result;
use crossbeam_channel::{Receiver, bounded};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};
use vibe_core::{
    DependencyEdge, FileMeta, FileSelector, FileUpdate, Language, SourceFile, Store, Symbol,
    VibeConfig, content_hash, line_count,
};

use crate::languages::ExtractorSet;
use crate::resolve::ResolverContext;
use crate::walk::{self, WalkedFile};

/// Files processed in parallel before their results are handed to the writer.
const SCAN_CHUNK: usize = 64;
/// Finished chunks waiting for the writer.
const PENDING_CHUNKS: usize = 2;

/// Shared flag for stopping a sweep between files.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters for one `scan_all` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub scanned: usize,
    /// Files whose content changed (or were new) and got re-extracted.
    pub changed: usize,
    /// Files skipped because mtime and size matched.
    pub unchanged: usize,
    /// Files whose mtime/size moved but whose hash did not.
    pub touched: usize,
    pub removed: usize,
    pub failed: usize,
    pub parse_failures: usize,
    pub coarse_edges: usize,
    pub cancelled: bool,
}

/// Edges produced by a one-shot resolution pass, without touching a store.
#[derive(Debug, Clone, Default)]
pub struct ResolvedEdges {
    pub coarse: Vec<DependencyEdge>,
    pub code: Vec<DependencyEdge>,
}

enum Outcome {
    Unchanged,
    Touched { path: String, mtime_ms: i64, size: u64, line_count: u32 },
    Changed { update: FileUpdate, parse_failed: bool },
    Failed,
    Cancelled,
}

pub struct Coordinator {
    root: PathBuf,
    config: VibeConfig,
    selector: FileSelector,
    extractors: ExtractorSet,
    cancel: CancelFlag,
}

impl Coordinator {
    pub fn new(root: impl Into<PathBuf>, config: VibeConfig) -> Self {
        let (selector, issues) = config.selector();
        for issue in &issues {
            warn!("Config entry {} ignored: {}", issue.entry, issue.reason);
        }
        let extractors = ExtractorSet::new(&config.critical_tags);
        Self {
            root: root.into(),
            config,
            selector,
            extractors,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &VibeConfig {
        &self.config
    }

    /// Full sweep: index changed files, purge vanished ones, rebuild the coarse graph.
    pub fn scan_all(&self, store: &mut Store) -> Result<ScanReport> {
        let files = walk::collect_files(&self.root, &self.selector);
        let stored = store.all_file_meta()?;
        let ctx = ResolverContext::new(files.iter().map(|f| f.rel_path.clone()), &self.config.architecture);

        let mut report = ScanReport { scanned: files.len(), ..Default::default() };
        let (tx, rx) = bounded::<Vec<Outcome>>(PENDING_CHUNKS);
        std::thread::scope(|scope| {
            let (files, stored, ctx) = (&files, &stored, &ctx);
            scope.spawn(move || {
                for chunk in files.chunks(SCAN_CHUNK) {
                    let outcomes: Vec<Outcome> = chunk
                        .par_iter()
                        .map(|file| self.process(file, stored.get(&file.rel_path), ctx))
                        .collect();
                    // the writer hung up: cancelled or failed
                    if tx.send(outcomes).is_err() {
                        break;
                    }
                }
            });
            self.drain(store, rx, &mut report)
        })?;

        if report.cancelled {
            info!("Scan cancelled after {} changed files", report.changed);
            return Ok(report);
        }

        let present: HashSet<String> = files.iter().map(|f| f.rel_path.clone()).collect();
        report.removed = store.purge_missing(&present)?.len();
        report.coarse_edges =
            self.rebuild_coarse(store, &ctx, files.iter().map(|f| f.rel_path.as_str()))?;

        info!(
            "Scan complete: {} files, {} changed, {} touched, {} unchanged, {} removed, {} failed",
            report.scanned, report.changed, report.touched, report.unchanged, report.removed, report.failed
        );
        Ok(report)
    }

    /// Re-index a single path. Returns whether the store changed.
    pub fn index_file(&self, store: &mut Store, path: &Path) -> Result<bool> {
        let Some(rel) = walk::rel_path(&self.root, path) else {
            warn!("Ignoring {} outside {}", path.display(), self.root.display());
            return Ok(false);
        };
        let abs_path = self.root.join(&rel);
        let language = Language::from_path(Path::new(&rel));
        let coarse_source = matches!(language, Language::ProjectFile | Language::Solution);

        if !abs_path.is_file() {
            if store.file(&rel)?.is_none() {
                return Ok(false);
            }
            debug!("Removing deleted file {}", rel);
            store.remove_paths(std::slice::from_ref(&rel))?;
            if coarse_source {
                self.rebuild_coarse_from_store(store)?;
            }
            return Ok(true);
        }
        if !self.selector.matches(&rel) {
            return Ok(false);
        }

        let mut paths = store.all_paths()?;
        if !paths.contains(&rel) {
            paths.push(rel.clone());
        }
        let ctx = ResolverContext::new(paths, &self.config.architecture);
        let stored = store.file(&rel)?.map(|f| FileMeta { mtime_ms: f.mtime_ms, size: f.size, hash: f.hash });
        let file = WalkedFile { rel_path: rel, abs_path };

        let mut report = ScanReport::default();
        let changed = match self.process(&file, stored.as_ref(), &ctx) {
            Outcome::Unchanged | Outcome::Cancelled => false,
            Outcome::Failed => return Ok(false),
            outcome => {
                let content_changed = matches!(outcome, Outcome::Changed { .. });
                self.apply(store, outcome, &mut report)?;
                content_changed
            }
        };
        if changed && coarse_source {
            self.rebuild_coarse_from_store(store)?;
        }
        Ok(changed)
    }

    /// Resolve every edge in the tree without persisting anything.
    pub fn resolve_all(&self) -> Result<ResolvedEdges> {
        let files = walk::collect_files(&self.root, &self.selector);
        let ctx = ResolverContext::new(files.iter().map(|f| f.rel_path.clone()), &self.config.architecture);

        let per_file: Vec<Vec<DependencyEdge>> = files
            .par_iter()
            .map(|file| {
                let language = Language::from_path(Path::new(&file.rel_path));
                match std::fs::read(&file.abs_path) {
                    Ok(bytes) => self.extract_and_resolve(&file.rel_path, language, &bytes, &ctx).1,
                    Err(e) => {
                        warn!("Cannot read {}: {}", file.rel_path, e);
                        Vec::new()
                    }
                }
            })
            .collect();

        let mut resolved = ResolvedEdges {
            coarse: self.coarse_edges(&ctx, files.iter().map(|f| f.rel_path.as_str())),
            code: per_file.into_iter().flatten().collect(),
        };
        resolved.code.retain(|e| !e.kind.is_coarse());
        debug!("Resolved {} coarse and {} code edges", resolved.coarse.len(), resolved.code.len());
        Ok(resolved)
    }

    fn process(&self, file: &WalkedFile, stored: Option<&FileMeta>, ctx: &ResolverContext) -> Outcome {
        if self.cancel.is_cancelled() {
            return Outcome::Cancelled;
        }
        let metadata = match std::fs::metadata(&file.abs_path) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Cannot stat {}: {}", file.rel_path, e);
                return Outcome::Failed;
            }
        };
        let mtime_ms = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX));
        let size = metadata.len();

        if let Some(meta) = stored {
            if meta.mtime_ms == mtime_ms && meta.size == size {
                return Outcome::Unchanged;
            }
        }

        let bytes = match std::fs::read(&file.abs_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Cannot read {}: {}", file.rel_path, e);
                return Outcome::Failed;
            }
        };
        let hash = content_hash(&bytes);
        let lines = line_count(&bytes);

        if stored.is_some_and(|meta| meta.hash == hash) {
            debug!("{} touched, content unchanged", file.rel_path);
            return Outcome::Touched { path: file.rel_path.clone(), mtime_ms, size, line_count: lines };
        }

        let language = Language::from_path(Path::new(&file.rel_path));
        let (symbols, edges, parse_failed) = self.extract_and_resolve(&file.rel_path, language, &bytes, ctx);
        let update = FileUpdate {
            file: SourceFile {
                path: file.rel_path.clone(),
                mtime_ms,
                hash,
                size,
                line_count: lines,
                language,
            },
            symbols,
            edges,
            content: Some(String::from_utf8_lossy(&bytes).into_owned()),
        };
        Outcome::Changed { update, parse_failed }
    }

    fn extract_and_resolve(
        &self,
        rel_path: &str,
        language: Language,
        bytes: &[u8],
        ctx: &ResolverContext,
    ) -> (Vec<Symbol>, Vec<DependencyEdge>, bool) {
        let Some(extractor) = self.extractors.get(language) else {
            return (Vec::new(), Vec::new(), false);
        };
        match extractor.extract(Path::new(rel_path), bytes) {
            Ok(result) => {
                let edges = ctx.resolve(rel_path, language, &result.imports);
                (result.symbols, edges, false)
            }
            Err(e) => {
                warn!("Cannot parse {}: {}", rel_path, e);
                (Vec::new(), Vec::new(), true)
            }
        }
    }

    /// Apply chunks as they arrive. Dropping `rx` on return stops the producer.
    fn drain(&self, store: &mut Store, rx: Receiver<Vec<Outcome>>, report: &mut ScanReport) -> Result<()> {
        for outcomes in rx {
            for outcome in outcomes {
                if self.cancel.is_cancelled() {
                    report.cancelled = true;
                    return Ok(());
                }
                self.apply(store, outcome, report)?;
            }
        }
        Ok(())
    }

    fn apply(&self, store: &mut Store, outcome: Outcome, report: &mut ScanReport) -> Result<()> {
        match outcome {
            Outcome::Unchanged => report.unchanged += 1,
            Outcome::Touched { path, mtime_ms, size, line_count } => {
                store.touch_file(&path, mtime_ms, size, line_count)?;
                report.touched += 1;
            }
            Outcome::Changed { update, parse_failed } => {
                store.apply_file_update(&update)?;
                report.changed += 1;
                if parse_failed {
                    report.parse_failures += 1;
                }
            }
            Outcome::Failed => report.failed += 1,
            Outcome::Cancelled => report.cancelled = true,
        }
        Ok(())
    }

    fn coarse_edges<'a>(
        &self,
        ctx: &ResolverContext,
        paths: impl Iterator<Item = &'a str>,
    ) -> Vec<DependencyEdge> {
        let mut edges = Vec::new();
        for path in paths {
            let language = Language::from_path(Path::new(path));
            if !matches!(language, Language::ProjectFile | Language::Solution) {
                continue;
            }
            match std::fs::read(self.root.join(path)) {
                Ok(bytes) => {
                    edges.extend(ctx.coarse_edges(path, language, &String::from_utf8_lossy(&bytes)))
                }
                Err(e) => warn!("Cannot read {}: {}", path, e),
            }
        }
        edges
    }

    fn rebuild_coarse<'a>(
        &self,
        store: &mut Store,
        ctx: &ResolverContext,
        paths: impl Iterator<Item = &'a str>,
    ) -> Result<usize> {
        let edges = self.coarse_edges(ctx, paths);
        store.replace_coarse_edges(&edges)?;
        debug!("Rebuilt coarse graph with {} edges", edges.len());
        Ok(edges.len())
    }

    fn rebuild_coarse_from_store(&self, store: &mut Store) -> Result<usize> {
        let paths = store.all_paths()?;
        let ctx = ResolverContext::new(paths.iter().cloned(), &self.config.architecture);
        self.rebuild_coarse(store, &ctx, paths.iter().map(String::as_str))
    }
}
