//! numstat log text through to a coupling report

use vibe_analysis::history::parse_numstat;
use vibe_analysis::{CouplingAnalyzer, CouplingReport};
use vibe_core::CouplingConfig;

/// Newest commit first, as `git log` prints them. `a.py` used to be `old_a.py`.
const LOG: &str = concat!(
    "\x1ec4\n1\t0\tsrc/a.py\n",
    "\x1ec3\n2\t1\tsrc/b.py\n4\t0\tsrc/c.py\n",
    "\x1ec2\n1\t1\tsrc/{old_a.py => a.py}\n1\t1\tsrc/b.py\n3\t3\tsrc/c.py\n",
    "\x1ec1\n5\t0\tsrc/old_a.py\n5\t0\tsrc/b.py\n",
);

fn analyze(min_jaccard: f64) -> CouplingReport {
    let (commits, _) = parse_numstat(LOG, true);
    let config = CouplingConfig { min_pair_count: 1, min_jaccard, ..CouplingConfig::default() };
    CouplingAnalyzer::new(config).analyze(&commits)
}

#[test]
fn test_renamed_file_keeps_its_history() {
    let report = analyze(0.3);
    let ab = report
        .pairs
        .iter()
        .find(|p| p.a == "src/a.py" && p.b == "src/b.py")
        .unwrap();
    assert_eq!(ab.count, 2);
    assert!((ab.jaccard - 0.5).abs() < 1e-9);
    assert!(report.pairs.iter().all(|p| !p.a.contains("old_a") && !p.b.contains("old_a")));
}

#[test]
fn test_threshold_changes_cluster_membership() {
    let low = analyze(0.3);
    assert_eq!(low.clusters.len(), 1);
    assert_eq!(low.clusters[0].nodes, vec!["src/a.py", "src/b.py", "src/c.py"]);

    let high = analyze(0.6);
    assert_eq!(high.clusters.len(), 1);
    assert_eq!(high.clusters[0].nodes, vec!["src/b.py", "src/c.py"]);
    assert!(high.boundary_leaks.is_empty());
}

#[test]
fn test_report_serializes() {
    let report = analyze(0.3);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["clusters"][0]["id"], 1);
    assert!(json["skipped"].is_null());
    assert!(json["generated_at"].is_string());
}
