//! Analyses layered on the index and on commit history

pub mod boundaries;
pub mod coupling;
pub mod cycles;
pub mod history;
pub mod hotspots;
pub mod impact;
pub mod playbook;

pub use boundaries::{BoundaryEngine, BoundaryReport, BoundaryRule, DEFAULT_MAX_VIOLATIONS, Violation, compile_rules};
pub use coupling::{
    BoundaryLeak, Cluster, CoChangeEdge, Commit, CouplingAnalyzer, CouplingReport, FileChange, Hub, RenameMap, jaccard,
};
pub use cycles::{CycleReport, detect_cycles};
pub use history::{HistoryOptions, HistoryOutcome, load_history};
pub use hotspots::{DEFAULT_HOTSPOT_LIMIT, HotspotReport, Ranked, find_hotspots};
pub use impact::{CHECKPOINT_RISK, DEFAULT_IMPACT_LIMIT, ImpactReport, ImpactedFile, analyze_impact, risk_score};
pub use playbook::{Bucket, Playbook, classify, playbooks_for};
