//! Vibe Core: data model, config, SQLite index and reference graph

pub mod config;
pub mod error;
pub mod graph;
pub mod model;
pub mod paths;
pub mod store;

pub use config::{
    ArchitectureConfig, ConfigIssue, CouplingConfig, FileSelector, GroupBy, RuleConfig, VibeConfig,
};
pub use error::VibeError;
pub use graph::ReferenceGraph;
pub use model::{
    DependencyEdge, EdgeKind, Language, SourceFile, Symbol, SymbolKind, content_hash, join_rel,
    line_count, normalize_rel_path, parent_dir,
};
pub use paths::{VIBE_DIR, clear_index, config_path, index_db_path, reports_dir, save_report};
pub use store::{FileMeta, FileStats, FileUpdate, SearchHit, Store, StoreCounts};
