//! Integration tests for Vibe
//!
//! These tests verify that the index, the analyses and the CLI work together.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;
use vibe_analysis::{BoundaryEngine, detect_cycles};
use vibe_core::{EdgeKind, Language, Store, VibeConfig, reports_dir};
use vibe_indexer::Coordinator;

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

/// A layered Python project whose domain layer imports infrastructure.
fn layered_repo() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "src/domain/__init__.py", "");
    write(root, "src/domain/order.py", "from infra.db import connect\n\nclass Order:\n    pass\n");
    write(root, "src/domain/pricing.py", "from domain.order import Order\n");
    write(root, "src/infra/__init__.py", "");
    write(root, "src/infra/db.py", "def connect():\n    pass\n");
    write(
        root,
        ".vibe/config.json",
        r#"{
  "architecture": {
    "rules": [
      {
        "name": "domain-no-infra",
        "from_globs": ["src/domain/**"],
        "to_globs": ["src/infra/**"],
        "reason": "domain stays persistence-agnostic"
      }
    ]
  }
}
"#,
    );
    temp_dir
}

fn vibe(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_vibe"))
        .arg("--root")
        .arg(root)
        .args(args)
        .output()
        .expect("Failed to execute vibe")
}

fn read_report(root: &Path, name: &str) -> serde_json::Value {
    let raw = fs::read_to_string(reports_dir(root).join(name)).unwrap();
    serde_json::from_str(&raw).unwrap()
}

/// Test that the CLI can be invoked
#[test]
fn test_cli_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_vibe")).arg("--help").output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("boundaries"));
    assert!(stdout.contains("coupling"));
}

#[test]
fn test_index_then_boundaries_from_store() {
    let temp_dir = layered_repo();
    let root = temp_dir.path();
    let config = VibeConfig::load(root).unwrap();

    let mut store = Store::open_for_repo(root).unwrap();
    Coordinator::new(root, config.clone()).scan_all(&mut store).unwrap();

    let report = BoundaryEngine::new(&config.architecture, 200)
        .check(&store.coarse_edges().unwrap(), &store.code_edges().unwrap());
    assert_eq!(report.violations.len(), 1);
    let violation = &report.violations[0];
    assert_eq!(violation.from, "src/domain/order.py");
    assert_eq!(violation.to, "src/infra/db.py");
    assert_eq!(violation.kind, EdgeKind::PyFrom);
    assert_eq!(violation.line, Some(1));
}

#[test]
fn test_boundaries_exit_policy() {
    let temp_dir = layered_repo();
    let root = temp_dir.path();

    // Without an index the edges are resolved on the fly.
    let default = vibe(root, &["boundaries"]);
    assert!(default.status.success());
    let report = read_report(root, "boundaries.json");
    assert_eq!(report["violations"].as_array().unwrap().len(), 1);
    assert_eq!(report["counts"]["domain-no-infra"], 1);

    let strict = vibe(root, &["boundaries", "--strict"]);
    assert_eq!(strict.status.code(), Some(1));

    let both = vibe(root, &["boundaries", "--strict", "--best-effort"]);
    assert_eq!(both.status.code(), Some(1));

    let lenient = vibe(root, &["boundaries", "--best-effort"]);
    assert!(lenient.status.success());
}

#[test]
fn test_malformed_config_is_an_engine_error() {
    let temp_dir = layered_repo();
    let root = temp_dir.path();
    write(root, ".vibe/config.json", "{ not json");

    assert!(!vibe(root, &["boundaries"]).status.success());
    assert!(vibe(root, &["boundaries", "--best-effort"]).status.success());
}

#[test]
fn test_cycles_report() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    let reference = |target: &str| {
        format!("<Project>\n  <ItemGroup>\n    <ProjectReference Include=\"{}\" />\n  </ItemGroup>\n</Project>\n", target)
    };
    write(root, "A/A.csproj", &reference("..\\B\\B.csproj"));
    write(root, "B/B.csproj", &reference("..\\A\\A.csproj"));

    let output = vibe(root, &["cycles"]);
    assert!(output.status.success());
    let report = read_report(root, "cycles.json");
    let cycle: Vec<&str> = report["cycle"].as_array().unwrap().iter().map(|v| v.as_str().unwrap()).collect();
    assert_eq!(cycle, vec!["A/A.csproj", "B/B.csproj", "A/A.csproj"]);
}

#[test]
fn test_coupling_outside_git_is_skipped() {
    let temp_dir = layered_repo();
    let root = temp_dir.path();

    let output = vibe(root, &["coupling"]);
    assert!(output.status.success());
    let report = read_report(root, "change_coupling.json");
    assert!(report["skipped"].as_str().unwrap().contains(".git"));
    assert!(report["clusters"].as_array().unwrap().is_empty());
}

#[test]
fn test_hotspots_report() {
    let temp_dir = layered_repo();
    let root = temp_dir.path();
    assert!(vibe(root, &["index"]).status.success());

    let output = vibe(root, &["hotspots"]);
    assert!(output.status.success());
    let report = read_report(root, "hotspots.json");
    let fan_in = report["fan_in"].as_array().unwrap();
    assert!(fan_in.iter().any(|e| e["path"] == "src/infra/db.py" && e["count"] == 1));
    assert!(fan_in.iter().any(|e| e["path"] == "src/domain/order.py" && e["count"] == 1));
    assert_eq!(report["largest_files"][0]["path"], "src/domain/order.py");
}

#[test]
fn test_impact_follows_importers() {
    let temp_dir = layered_repo();
    let root = temp_dir.path();

    let output = vibe(root, &["impact", "src/infra/db.py"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("src/domain/order.py (depth 1)"));
    assert!(stdout.contains("src/domain/pricing.py (depth 2)"));

    let report = read_report(root, "impact.json");
    assert_eq!(report["target"], "src/infra/db.py");
    assert_eq!(report["direct"], 1);
    assert_eq!(report["critical"], false);

    assert!(!vibe(root, &["impact", "../elsewhere.py"]).status.success());
}

#[test]
fn test_index_search_and_clear() {
    let temp_dir = layered_repo();
    let root = temp_dir.path();

    assert!(!vibe(root, &["search", "Order"]).status.success());
    assert!(vibe(root, &["index"]).status.success());

    let output = vibe(root, &["search", "Order"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("src/domain/order.py"));

    assert!(vibe(root, &["clear"]).status.success());
    assert!(!vibe(root, &["search", "Order"]).status.success());
}

#[test]
fn test_index_file_picks_up_new_file() {
    let temp_dir = layered_repo();
    let root = temp_dir.path();
    assert!(vibe(root, &["index"]).status.success());

    write(root, "src/infra/cache.py", "class Cache:\n    pass\n");
    assert!(vibe(root, &["index-file", "src/infra/cache.py"]).status.success());

    let store = Store::open_for_repo(root).unwrap();
    let file = store.file("src/infra/cache.py").unwrap().unwrap();
    assert_eq!(file.language, Language::Python);
    assert_eq!(store.symbols_for_file("src/infra/cache.py").unwrap()[0].name, "Cache");
}

#[test]
fn test_cycle_detection_on_indexed_dag() {
    let temp_dir = layered_repo();
    let root = temp_dir.path();
    let resolved = Coordinator::new(root, VibeConfig::load(root).unwrap()).resolve_all().unwrap();
    let report = detect_cycles(&resolved.code);
    assert!(report.cycle.is_none());
    assert!(report.nodes >= 3);
}
