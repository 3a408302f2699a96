//! End-to-end sweeps over temporary repositories

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use tempfile::TempDir;
use vibe_core::{EdgeKind, Store, SymbolKind, VibeConfig};
use vibe_indexer::{Coordinator, ScanReport};

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn bump_mtime(root: &Path, rel: &str) {
    let file = fs::File::options().write(true).open(root.join(rel)).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(120)).unwrap();
}

fn fixture() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "src/app/__init__.py", "");
    write(root, "src/app/models.py", "class User:\n    pass\n");
    write(root, "src/app/views.py", "from .models import User\nimport app.models\n\ndef show():\n    pass\n");
    write(root, "web/main.ts", "import { api } from './api';\nimport React from 'react';\n");
    write(root, "web/api/index.ts", "export const api = () => 1;\n");
    write(root, "native/render.cpp", "#include \"render.h\"\nint draw() {\n  return 0;\n}\n");
    write(root, "native/render.h", "int draw();\n");
    write(
        root,
        "Shop/Shop.csproj",
        "<Project>\n  <ItemGroup>\n    <ProjectReference Include=\"..\\Core\\Core.csproj\" />\n  </ItemGroup>\n</Project>\n",
    );
    write(root, "Core/Core.csproj", "<Project />\n");
    write(root, "Core/Order.cs", "namespace Core;\n\npublic class Order\n{\n    public void Place() { }\n}\n");
    write(root, "node_modules/react/index.js", "module.exports = {};\n");
    temp_dir
}

fn scan(root: &Path, store: &mut Store) -> ScanReport {
    Coordinator::new(root, VibeConfig::default()).scan_all(store).unwrap()
}

#[test]
fn test_first_sweep_indexes_everything() {
    let temp_dir = fixture();
    let mut store = Store::open_in_memory().unwrap();
    let report = scan(temp_dir.path(), &mut store);

    assert_eq!(report.scanned, 10);
    assert_eq!(report.changed, 10);
    assert_eq!(report.failed, 0);
    assert_eq!(report.coarse_edges, 1);
    assert!(store.file("node_modules/react/index.js").unwrap().is_none());

    let views: Vec<(String, EdgeKind)> = store
        .edges_from("src/app/views.py")
        .unwrap()
        .into_iter()
        .map(|e| (e.to, e.kind))
        .collect();
    assert_eq!(
        views,
        vec![
            ("src/app/models.py".to_string(), EdgeKind::PyFrom),
            ("src/app/models.py".to_string(), EdgeKind::PyImport),
        ]
    );

    let main = store.edges_from("web/main.ts").unwrap();
    assert_eq!(main.len(), 1);
    assert_eq!(main[0].to, "web/api/index.ts");

    let render = store.edges_from("native/render.cpp").unwrap();
    assert_eq!(render[0].to, "native/render.h");
    assert_eq!(render[0].kind, EdgeKind::CppInclude);

    let coarse = store.coarse_edges().unwrap();
    assert_eq!(coarse[0].from, "Shop/Shop.csproj");
    assert_eq!(coarse[0].to, "Core/Core.csproj");

    let order = store.symbols_for_file("Core/Order.cs").unwrap();
    assert!(order.iter().any(|s| s.name == "Core.Order.Place" && s.kind == SymbolKind::Method));
}

#[test]
fn test_second_sweep_is_a_no_op() {
    let temp_dir = fixture();
    let mut store = Store::open_in_memory().unwrap();
    scan(temp_dir.path(), &mut store);
    let counts = store.counts().unwrap();
    let edges = store.all_edges().unwrap();

    let report = scan(temp_dir.path(), &mut store);
    assert_eq!(report.changed, 0);
    assert_eq!(report.touched, 0);
    assert_eq!(report.unchanged, 10);
    assert_eq!(report.removed, 0);
    assert_eq!(store.counts().unwrap(), counts);
    assert_eq!(store.all_edges().unwrap(), edges);
}

#[test]
fn test_mtime_only_change_keeps_hash_and_symbols() {
    let temp_dir = fixture();
    let mut store = Store::open_in_memory().unwrap();
    scan(temp_dir.path(), &mut store);
    let before = store.file("src/app/models.py").unwrap().unwrap();
    let symbols = store.symbols_for_file("src/app/models.py").unwrap();

    bump_mtime(temp_dir.path(), "src/app/models.py");
    let report = scan(temp_dir.path(), &mut store);

    assert_eq!(report.touched, 1);
    assert_eq!(report.changed, 0);
    let after = store.file("src/app/models.py").unwrap().unwrap();
    assert_eq!(after.hash, before.hash);
    assert_ne!(after.mtime_ms, before.mtime_ms);
    assert_eq!(store.symbols_for_file("src/app/models.py").unwrap(), symbols);
}

#[test]
fn test_content_change_replaces_symbols() {
    let temp_dir = fixture();
    let mut store = Store::open_in_memory().unwrap();
    scan(temp_dir.path(), &mut store);

    write(temp_dir.path(), "src/app/models.py", "class Account:\n    pass\n\n\nclass Ledger:\n    pass\n");
    bump_mtime(temp_dir.path(), "src/app/models.py");
    let report = scan(temp_dir.path(), &mut store);

    assert_eq!(report.changed, 1);
    let names: Vec<String> = store
        .symbols_for_file("src/app/models.py")
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["Account", "Ledger"]);
}

#[test]
fn test_deleted_files_are_purged() {
    let temp_dir = fixture();
    let mut store = Store::open_in_memory().unwrap();
    scan(temp_dir.path(), &mut store);

    fs::remove_file(temp_dir.path().join("Core/Core.csproj")).unwrap();
    let report = scan(temp_dir.path(), &mut store);

    assert_eq!(report.removed, 1);
    assert_eq!(report.coarse_edges, 0);
    assert!(store.file("Core/Core.csproj").unwrap().is_none());
    assert!(store.coarse_edges().unwrap().is_empty());
}

#[test]
fn test_index_file_single_path() {
    let temp_dir = fixture();
    let root = temp_dir.path();
    let coordinator = Coordinator::new(root, VibeConfig::default());
    let mut store = Store::open_in_memory().unwrap();
    coordinator.scan_all(&mut store).unwrap();

    // Unchanged file
    assert!(!coordinator.index_file(&mut store, &root.join("web/main.ts")).unwrap());

    // New file resolving against the stored set
    write(root, "web/extra.ts", "import { api } from './api';\n");
    assert!(coordinator.index_file(&mut store, Path::new("web/extra.ts")).unwrap());
    assert_eq!(store.edges_from("web/extra.ts").unwrap()[0].to, "web/api/index.ts");

    // Deleted file
    fs::remove_file(root.join("web/extra.ts")).unwrap();
    assert!(coordinator.index_file(&mut store, &root.join("web/extra.ts")).unwrap());
    assert!(store.file("web/extra.ts").unwrap().is_none());
    assert!(!coordinator.index_file(&mut store, &root.join("web/extra.ts")).unwrap());

    // Excluded directory
    assert!(!coordinator.index_file(&mut store, &root.join("node_modules/react/index.js")).unwrap());
}

#[test]
fn test_resolve_all_without_store() {
    let temp_dir = fixture();
    let coordinator = Coordinator::new(temp_dir.path(), VibeConfig::default());
    let resolved = coordinator.resolve_all().unwrap();
    assert_eq!(resolved.coarse.len(), 1);
    assert!(resolved.code.iter().any(|e| e.kind == EdgeKind::CppInclude));
    assert!(resolved.code.iter().all(|e| !e.kind.is_coarse()));
}

#[test]
fn test_on_disk_store_survives_reopen() {
    let temp_dir = fixture();
    {
        let mut store = Store::open_for_repo(temp_dir.path()).unwrap();
        scan(temp_dir.path(), &mut store);
    }
    let mut store = Store::open_for_repo(temp_dir.path()).unwrap();
    let report = scan(temp_dir.path(), &mut store);
    // The db lives under .vibe/, which the walk prunes.
    assert_eq!(report.scanned, 10);
    assert_eq!(report.changed, 0);
}
