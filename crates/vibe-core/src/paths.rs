//! Layout of the `.vibe/` state directory

use std::path::{Path, PathBuf};

use serde::Serialize;

/// State directory: .vibe/
pub const VIBE_DIR: &str = ".vibe";

/// Config file inside the state directory
pub const CONFIG_FILE: &str = "config.json";

/// Index database, relative to the state directory
pub const INDEX_DB: &str = "db/context.sqlite";

/// Report directory, relative to the state directory
pub const REPORTS_DIR: &str = "reports";

pub fn vibe_dir(root: &Path) -> PathBuf {
    root.join(VIBE_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    vibe_dir(root).join(CONFIG_FILE)
}

pub fn index_db_path(root: &Path) -> PathBuf {
    vibe_dir(root).join(INDEX_DB)
}

pub fn reports_dir(root: &Path) -> PathBuf {
    vibe_dir(root).join(REPORTS_DIR)
}

/// Ensure the parent directory of `path` exists
pub fn ensure_parent(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Write a JSON report to `.vibe/reports/<name>` and return its path.
pub fn save_report<T: Serialize>(root: &Path, name: &str, report: &T) -> anyhow::Result<PathBuf> {
    let path = reports_dir(root).join(name);
    ensure_parent(&path)?;
    let json_str = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json_str + "\n")?;

    tracing::debug!("Report saved: {}", path.display());
    Ok(path)
}

/// Remove the index database (and its WAL side files)
pub fn clear_index(root: &Path) -> std::io::Result<()> {
    let db = index_db_path(root);
    for suffix in ["", "-wal", "-shm"] {
        let mut name = db.clone().into_os_string();
        name.push(suffix);
        let path = PathBuf::from(name);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}
