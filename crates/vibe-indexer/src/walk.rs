//! Enumerate indexable files under a repository root

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tracing::{debug, warn};
use vibe_core::{FileSelector, normalize_rel_path};

/// A file selected for indexing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct WalkedFile {
    /// Repo-relative, forward-slash path.
    pub rel_path: String,
    pub abs_path: PathBuf,
}

/// Repo-relative form of `path`, or `None` if it lies outside `root`.
pub fn rel_path(root: &Path, path: &Path) -> Option<String> {
    let rel = if path.is_absolute() {
        path.strip_prefix(root).ok()?
    } else {
        path
    };
    normalize_rel_path(rel).filter(|p| !p.is_empty())
}

/// Walk `root`, pruning excluded directories, and return matching files sorted by path.
///
/// `.gitignore` rules apply inside git repositories; hidden files are not skipped
/// so that dot-directories are only pruned when listed in the exclusions.
pub fn collect_files(root: &Path, selector: &FileSelector) -> Vec<WalkedFile> {
    let prune = selector.clone();
    let mut walker_builder = WalkBuilder::new(root);
    walker_builder
        .hidden(false)
        .git_ignore(true)
        .git_exclude(true)
        .ignore(true)
        .parents(false)
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            if is_dir && entry.depth() > 0 {
                if let Some(name) = entry.file_name().to_str() {
                    return !prune.is_excluded_dir(name);
                }
            }
            true
        });

    let mut files = Vec::new();
    for result in walker_builder.build() {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Walk error under {}: {}", root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let Some(rel) = rel_path(root, entry.path()) else {
            continue;
        };
        if selector.matches(&rel) {
            files.push(WalkedFile {
                rel_path: rel,
                abs_path: entry.into_path(),
            });
        }
    }
    files.sort();
    debug!("Collected {} files under {}", files.len(), root.display());
    files
}
