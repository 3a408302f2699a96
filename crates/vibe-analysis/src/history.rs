//! Commit history from `git log --numstat`

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};
use vibe_core::{CouplingConfig, VibeError};

use crate::coupling::{Commit, FileChange, RenameMap};

/// Separates commit records in the log output.
const RECORD_SEPARATOR: char = '\x1e';

#[derive(Debug, Clone)]
pub struct HistoryOptions {
    pub max_commits: usize,
    pub since: Option<String>,
    pub detect_renames: bool,
    pub timeout: Duration,
}

impl Default for HistoryOptions {
    fn default() -> Self {
        HistoryOptions::from(&CouplingConfig::default())
    }
}

impl From<&CouplingConfig> for HistoryOptions {
    fn from(config: &CouplingConfig) -> Self {
        HistoryOptions {
            max_commits: config.max_commits,
            since: config.since.clone(),
            detect_renames: config.detect_renames,
            timeout: Duration::from_secs(config.git_timeout_secs.max(1)),
        }
    }
}

#[derive(Debug)]
pub enum HistoryOutcome {
    Loaded { commits: Vec<Commit>, renames: RenameMap },
    Skipped { reason: String },
}

fn unavailable(reason: impl Into<String>) -> HistoryOutcome {
    let err = VibeError::HistoryUnavailable(reason.into());
    warn!("{}", err);
    HistoryOutcome::Skipped { reason: err.to_string() }
}

/// Read recent non-merge commits of the repository at `root`.
///
/// Never fails: a missing repository or git binary, a failing command and a
/// hung command all come back as `Skipped`.
pub async fn load_history(root: &Path, opts: &HistoryOptions) -> HistoryOutcome {
    if !root.join(".git").exists() {
        return unavailable("no .git directory found");
    }

    let mut cmd = Command::new("git");
    cmd.args(log_args(opts));
    cmd.current_dir(root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(opts.timeout, cmd.output()).await {
        Err(_) => return unavailable(format!("git log timed out after {:?}", opts.timeout)),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => return unavailable("git not found"),
        Ok(Err(e)) => return unavailable(format!("failed to run git: {}", e)),
        Ok(Ok(output)) => output,
    };
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = match stderr.trim() {
            "" => format!("git log failed ({})", output.status),
            msg => msg.to_string(),
        };
        return unavailable(reason);
    }

    let text = String::from_utf8_lossy(&output.stdout);
    let (commits, renames) = parse_numstat(&text, opts.detect_renames);
    debug!("Loaded {} commits ({} renames) from git", commits.len(), renames.len());
    HistoryOutcome::Loaded { commits, renames }
}

/// Arguments for `git`; paths are printed raw so non-ASCII names match the index.
fn log_args(opts: &HistoryOptions) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-c".into(),
        "core.quotepath=off".into(),
        "log".into(),
        format!("--pretty=format:{}%H", RECORD_SEPARATOR),
        "--no-merges".into(),
        "--numstat".into(),
        format!("--max-count={}", opts.max_commits.max(1)),
        if opts.detect_renames { "-M" } else { "--no-renames" }.into(),
    ];
    if let Some(since) = &opts.since {
        args.push(format!("--since={}", since));
    }
    args
}

/// Parse separator-delimited `--numstat` records, newest commit first.
///
/// Paths are canonicalized against the renames seen so far, so an older
/// commit touching a since-renamed file is attributed to its current name
/// while a path reused after a rename keeps its own history.
pub fn parse_numstat(text: &str, detect_renames: bool) -> (Vec<Commit>, RenameMap) {
    let mut commits = Vec::new();
    let mut renames = RenameMap::new();

    for record in text.split(RECORD_SEPARATOR) {
        let mut lines = record.lines();
        let Some(id) = lines.next().map(str::trim).filter(|id| !id.is_empty()) else {
            continue;
        };
        let mut files = Vec::new();
        for line in lines {
            let mut parts = line.splitn(3, '\t');
            let (Some(added), Some(deleted), Some(path)) = (parts.next(), parts.next(), parts.next()) else {
                continue;
            };
            let (Some(added), Some(deleted)) = (count(added), count(deleted)) else {
                continue;
            };
            let path = match split_rename(path) {
                Some((old, new)) => {
                    let new = renames.canonical(&new);
                    if detect_renames {
                        let old = renames.canonical(&old);
                        renames.record(old, new.clone());
                    }
                    new
                }
                None => renames.canonical(path),
            };
            files.push(FileChange { path, added, deleted });
        }
        commits.push(Commit { id: id.to_string(), files });
    }
    (commits, renames)
}

/// Line count column; binary files show `-`.
fn count(field: &str) -> Option<u64> {
    match field.trim() {
        "-" => Some(0),
        n => n.parse().ok(),
    }
}

/// Split `old => new` or `pre/{old => new}/post` into both full paths.
fn split_rename(path: &str) -> Option<(String, String)> {
    if let (Some(open), Some(close)) = (path.find('{'), path.rfind('}')) {
        if open < close {
            let (prefix, suffix) = (&path[..open], &path[close + 1..]);
            let (old, new) = path[open + 1..close].split_once(" => ")?;
            let join = |middle: &str| format!("{}{}{}", prefix, middle, suffix).replace("//", "/");
            return Some((join(old), join(new)));
        }
    }
    let (old, new) = path.split_once(" => ")?;
    Some((old.trim().to_string(), new.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const LOG: &str = "\x1eaaa111\n3\t1\tsrc/app.py\n-\t-\tassets/logo.png\n\n\x1ebbb222\n10\t0\tsrc/{util => core}/ids.py\n2\t2\tdocs/old.md => docs/new.md\n\x1eccc333\n";

    #[test]
    fn test_parse_numstat_records() {
        let (commits, renames) = parse_numstat(LOG, true);
        assert_eq!(commits.len(), 3);
        assert_eq!(commits[0].id, "aaa111");
        assert_eq!(commits[0].files[0], FileChange { path: "src/app.py".into(), added: 3, deleted: 1 });
        assert_eq!(commits[0].files[1].added, 0);

        let paths: Vec<&str> = commits[1].files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["src/core/ids.py", "docs/new.md"]);
        assert_eq!(renames.canonical("src/util/ids.py"), "src/core/ids.py");
        assert_eq!(renames.canonical("docs/old.md"), "docs/new.md");
        assert!(commits[2].files.is_empty());
    }

    #[test]
    fn test_renames_ignored_when_detection_off() {
        let (_, renames) = parse_numstat(LOG, false);
        assert!(renames.is_empty());
    }

    #[test]
    fn test_split_rename_forms() {
        assert_eq!(
            split_rename("lib/{ => nested}/mod.rs"),
            Some(("lib/mod.rs".to_string(), "lib/nested/mod.rs".to_string()))
        );
        assert_eq!(split_rename("{a.py => b.py}"), Some(("a.py".to_string(), "b.py".to_string())));
        assert_eq!(split_rename("plain/path.py"), None);
    }

    #[test]
    fn test_path_reused_after_rename_keeps_its_own_history() {
        let log = "\x1ec3\n1\t0\ta.py\n1\t0\tc.py\n\x1ec2\n0\t0\ta.py => b.py\n\x1ec1\n1\t0\ta.py\n1\t0\td.py\n";
        let (commits, _) = parse_numstat(log, true);
        let paths: Vec<Vec<&str>> = commits
            .iter()
            .map(|c| c.files.iter().map(|f| f.path.as_str()).collect())
            .collect();
        assert_eq!(paths, vec![vec!["a.py", "c.py"], vec!["b.py"], vec!["b.py", "d.py"]]);
    }

    #[test]
    fn test_rename_chain_resolves_to_newest_name() {
        let log = "\x1ec3\n0\t0\tmid.py => new.py\n\x1ec2\n0\t0\told.py => mid.py\n\x1ec1\n4\t0\told.py\n";
        let (commits, renames) = parse_numstat(log, true);
        assert_eq!(commits[2].files[0].path, "new.py");
        assert_eq!(renames.canonical("old.py"), "new.py");
    }

    #[test]
    fn test_log_args_print_raw_paths() {
        let opts = HistoryOptions { since: Some("2024-01-01".into()), ..HistoryOptions::default() };
        let args = log_args(&opts);
        assert_eq!(&args[..3], &["-c", "core.quotepath=off", "log"]);
        assert!(args.contains(&"--since=2024-01-01".to_string()));
        assert!(args.contains(&"--no-renames".to_string()));
    }

    #[tokio::test]
    async fn test_non_repository_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        match load_history(temp_dir.path(), &HistoryOptions::default()).await {
            HistoryOutcome::Skipped { reason } => assert!(reason.contains(".git")),
            HistoryOutcome::Loaded { .. } => panic!("expected history to be skipped"),
        }
    }
}
