//! Debounced filesystem watching that keeps the index current

pub mod watcher;

pub use watcher::{DEFAULT_QUIET_PERIOD, Debouncer, FileWatcher, WatchEvent, WatchSummary, WatcherService};
