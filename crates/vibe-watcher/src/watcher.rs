//! Filesystem watcher driving single-file index updates

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Result;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use vibe_core::{Store, StoreCounts, VIBE_DIR};
use vibe_indexer::Coordinator;

/// Quiet time a path needs before it is re-indexed.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(400);

/// Events emitted by the file watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Created(p) | WatchEvent::Modified(p) | WatchEvent::Removed(p) => p,
        }
    }
}

/// Recursive OS watcher feeding an unbounded channel.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    event_rx: mpsc::UnboundedReceiver<WatchEvent>,
    root_path: PathBuf,
}

impl FileWatcher {
    pub fn new(root_path: impl AsRef<Path>) -> Result<Self> {
        let root_path = root_path.as_ref().to_path_buf();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) => Self::handle_notify_event(event, &event_tx),
            Err(e) => error!("File system watch error: {}", e),
        })?;

        Ok(Self { watcher, event_rx, root_path })
    }

    fn handle_notify_event(event: notify::Event, event_tx: &mpsc::UnboundedSender<WatchEvent>) {
        let make: fn(PathBuf) -> WatchEvent = match event.kind {
            notify::EventKind::Create(_) => WatchEvent::Created,
            notify::EventKind::Modify(_) => WatchEvent::Modified,
            notify::EventKind::Remove(_) => WatchEvent::Removed,
            _ => return,
        };
        for path in event.paths {
            if should_ignore_path(&path) {
                continue;
            }
            if let Err(e) = event_tx.send(make(path)) {
                warn!("Failed to forward watch event: {}", e);
            }
        }
    }

    pub fn watch_root(&mut self) -> Result<()> {
        info!("Watching directory: {:?}", self.root_path);
        self.watcher.watch(&self.root_path, RecursiveMode::Recursive)?;
        Ok(())
    }

    pub async fn next_event(&mut self) -> Option<WatchEvent> {
        self.event_rx.recv().await
    }
}

/// Per-path debounce: each event restarts that path's quiet period.
#[derive(Debug)]
pub struct Debouncer {
    quiet: Duration,
    pending: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Debouncer { quiet, pending: HashMap::new() }
    }

    pub fn record(&mut self, path: PathBuf, at: Instant) {
        self.pending.insert(path, at);
    }

    /// Earliest instant at which some pending path becomes due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().map(|last| *last + self.quiet)
    }

    /// Remove and return the paths that have been quiet long enough, sorted.
    pub fn take_due(&mut self, now: Instant) -> Vec<PathBuf> {
        let mut due: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, last)| **last + self.quiet <= now)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &due {
            self.pending.remove(path);
        }
        due.sort();
        due
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Outcome of one debounced flush.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchSummary {
    pub flushed: usize,
    pub changed: usize,
    pub failed: usize,
    pub counts: StoreCounts,
}

enum Step {
    Event(Option<WatchEvent>),
    Flush,
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}

/// Watches the repository and re-indexes changed paths after they settle.
pub struct WatcherService {
    watcher: FileWatcher,
    coordinator: Coordinator,
    store: Store,
    debouncer: Debouncer,
}

impl WatcherService {
    pub fn new(coordinator: Coordinator, store: Store) -> Result<Self> {
        let watcher = FileWatcher::new(coordinator.root())?;
        Ok(Self {
            watcher,
            coordinator,
            store,
            debouncer: Debouncer::new(DEFAULT_QUIET_PERIOD),
        })
    }

    pub fn with_quiet_period(mut self, quiet: Duration) -> Self {
        self.debouncer = Debouncer::new(quiet);
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Run until the event stream closes or the coordinator is cancelled.
    ///
    /// `on_summary` is called after every flush that changed the index.
    pub async fn run<F>(&mut self, mut on_summary: F) -> Result<()>
    where
        F: FnMut(&WatchSummary),
    {
        self.watcher.watch_root()?;
        let cancel = self.coordinator.cancel_flag();

        while !cancel.is_cancelled() {
            let deadline = self.debouncer.next_deadline();
            let step = tokio::select! {
                event = self.watcher.next_event() => Step::Event(event),
                _ = wait_until(deadline) => Step::Flush,
            };
            match step {
                Step::Event(Some(event)) => {
                    debug!("Watch event: {:?}", event);
                    self.debouncer.record(event.path().to_path_buf(), Instant::now());
                }
                Step::Event(None) => break,
                Step::Flush => {
                    let due = self.debouncer.take_due(Instant::now());
                    if due.is_empty() {
                        continue;
                    }
                    let summary = self.flush(&due)?;
                    if summary.changed > 0 {
                        on_summary(&summary);
                    }
                }
            }
        }
        Ok(())
    }

    /// Index each path once. Per-path failures are logged and counted.
    pub fn flush(&mut self, paths: &[PathBuf]) -> Result<WatchSummary> {
        let mut changed = 0;
        let mut failed = 0;
        for path in paths {
            match self.coordinator.index_file(&mut self.store, path) {
                Ok(true) => {
                    info!("Re-indexed {}", path.display());
                    changed += 1;
                }
                Ok(false) => debug!("No index change for {}", path.display()),
                Err(e) => {
                    warn!("Failed to index {}: {:#}", path.display(), e);
                    failed += 1;
                }
            }
        }
        Ok(WatchSummary {
            flushed: paths.len(),
            changed,
            failed,
            counts: self.store.counts()?,
        })
    }
}

/// Paths under VCS or index state never trigger work.
fn should_ignore_path(path: &Path) -> bool {
    path.components()
        .filter_map(|c| c.as_os_str().to_str())
        .any(|name| name == ".git" || name == VIBE_DIR)
}
