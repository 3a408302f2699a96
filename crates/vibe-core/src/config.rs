//! `.vibe/config.json` model
//!
//! Every field has a default so a missing or partial config still yields a
//! usable setup. Unknown top-level sections are ignored.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::Context;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::VibeError;
use crate::paths;

const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    "node_modules", "vendor", "third_party", "external", "extern", "deps", ".git", ".vibe",
    ".venv", "venv", ".tox", ".pytest_cache", ".mypy_cache", ".ruff_cache", ".cache", ".idea",
    "dist", "build", "out", "coverage", "bin", "obj", "artifacts", "target", ".gradle",
    ".dart_tool", ".next", ".nuxt", ".svelte-kit", ".turbo", ".tmp", "__pycache__",
];

const DEFAULT_INCLUDE_GLOBS: &[&str] = &[
    "**/*.cs", "**/*.xaml", "**/*.fs", "**/*.vb", "**/*.py", "**/*.js", "**/*.jsx", "**/*.ts",
    "**/*.tsx", "**/*.go", "**/*.rs", "**/*.java", "**/*.kt", "**/*.c", "**/*.h", "**/*.cpp",
    "**/*.hpp", "**/*.csproj", "**/*.sln", "**/*.fsproj", "**/*.vbproj", "**/*.md", "**/*.json",
    "**/*.yml", "**/*.yaml", "**/*.toml", "**/*.xml",
];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VibeConfig {
    pub exclude_dirs: Vec<String>,
    pub include_globs: Vec<String>,
    pub critical_tags: Vec<String>,
    pub architecture: ArchitectureConfig,
    pub coupling: CouplingConfig,
}

impl Default for VibeConfig {
    fn default() -> Self {
        VibeConfig {
            exclude_dirs: strings(DEFAULT_EXCLUDE_DIRS),
            include_globs: strings(DEFAULT_INCLUDE_GLOBS),
            critical_tags: strings(&["@critical", "CRITICAL:"]),
            architecture: ArchitectureConfig::default(),
            coupling: CouplingConfig::default(),
        }
    }
}

impl VibeConfig {
    /// Load `<root>/.vibe/config.json`, falling back to defaults when absent.
    pub fn load(root: &Path) -> anyhow::Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Build the include/exclude matcher for this config.
    pub fn selector(&self) -> (FileSelector, Vec<ConfigIssue>) {
        FileSelector::new(&self.include_globs, &self.exclude_dirs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchitectureConfig {
    pub enabled: bool,
    /// Kept as raw JSON so one malformed rule can be rejected on its own.
    pub rules: Vec<serde_json::Value>,
    pub python_roots: Vec<String>,
    pub js_aliases: BTreeMap<String, String>,
}

impl Default for ArchitectureConfig {
    fn default() -> Self {
        ArchitectureConfig {
            enabled: true,
            rules: Vec::new(),
            python_roots: strings(&["src", "."]),
            js_aliases: BTreeMap::new(),
        }
    }
}

impl ArchitectureConfig {
    /// Decode the rule list, rejecting malformed entries individually.
    pub fn rule_configs(&self) -> (Vec<RuleConfig>, Vec<ConfigIssue>) {
        let mut rules = Vec::new();
        let mut issues = Vec::new();
        for (idx, raw) in self.rules.iter().enumerate() {
            match serde_json::from_value::<RuleConfig>(raw.clone()) {
                Ok(rule) => rules.push(rule),
                Err(e) => {
                    let entry = raw
                        .get("name")
                        .and_then(|n| n.as_str())
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("rules[{}]", idx));
                    tracing::warn!("Rejecting boundary rule {}: {}", entry, e);
                    issues.push(ConfigIssue { entry, reason: e.to_string() });
                }
            }
        }
        (rules, issues)
    }
}

/// A boundary rule as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    #[serde(default)]
    pub from_globs: Vec<String>,
    #[serde(default)]
    pub to_globs: Vec<String>,
    #[serde(default)]
    pub kinds: Vec<String>,
    #[serde(default)]
    pub reason: String,
}

/// How coupling analysis groups paths into nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    File,
    Dir,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CouplingConfig {
    pub max_commits: usize,
    pub since: Option<String>,
    pub min_pair_count: u32,
    pub min_jaccard: f64,
    pub max_files_per_commit: usize,
    /// Skip commits with more added+deleted lines than this; 0 disables.
    pub max_churn_per_commit: u64,
    pub top: usize,
    pub detect_renames: bool,
    pub group_by: GroupBy,
    pub dir_depth: usize,
    pub min_cluster_size: usize,
    pub max_clusters: usize,
    pub max_boundary_leaks: usize,
    pub max_hubs: usize,
    pub git_timeout_secs: u64,
}

impl Default for CouplingConfig {
    fn default() -> Self {
        CouplingConfig {
            max_commits: 200,
            since: None,
            min_pair_count: 3,
            min_jaccard: 0.2,
            max_files_per_commit: 80,
            max_churn_per_commit: 0,
            top: 20,
            detect_renames: false,
            group_by: GroupBy::File,
            dir_depth: 2,
            min_cluster_size: 2,
            max_clusters: 10,
            max_boundary_leaks: 20,
            max_hubs: 20,
            git_timeout_secs: 30,
        }
    }
}

/// A rejected configuration entry, reported alongside results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigIssue {
    pub entry: String,
    pub reason: String,
}

impl From<VibeError> for ConfigIssue {
    fn from(err: VibeError) -> Self {
        match err {
            VibeError::Config { entry, reason } => ConfigIssue { entry, reason },
            other => ConfigIssue { entry: String::new(), reason: other.to_string() },
        }
    }
}

/// Decides which repo-relative paths are in scope.
#[derive(Debug, Clone)]
pub struct FileSelector {
    include: GlobSet,
    exclude_dirs: HashSet<String>,
}

impl FileSelector {
    pub fn new(include_globs: &[String], exclude_dirs: &[String]) -> (Self, Vec<ConfigIssue>) {
        let mut builder = GlobSetBuilder::new();
        let mut issues = Vec::new();
        for pattern in include_globs {
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => {
                    tracing::warn!("Ignoring include glob {}: {}", pattern, e);
                    issues.push(ConfigIssue { entry: pattern.clone(), reason: e.to_string() });
                }
            }
        }
        let include = builder.build().unwrap_or_else(|e| {
            issues.push(ConfigIssue { entry: "include_globs".to_string(), reason: e.to_string() });
            GlobSet::empty()
        });
        let selector = FileSelector {
            include,
            exclude_dirs: exclude_dirs.iter().cloned().collect(),
        };
        (selector, issues)
    }

    /// Whether a directory name is pruned from walks.
    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.exclude_dirs.contains(name)
    }

    /// Whether a repo-relative forward-slash path is indexed.
    pub fn matches(&self, rel_path: &str) -> bool {
        let mut parts: Vec<&str> = rel_path.split('/').collect();
        parts.pop();
        if parts.iter().any(|dir| self.is_excluded_dir(dir)) {
            return false;
        }
        self.include.is_match(rel_path)
    }
}

impl Default for FileSelector {
    fn default() -> Self {
        let config = VibeConfig::default();
        config.selector().0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_vibe_kit() {
        let config = VibeConfig::default();
        assert!(config.exclude_dirs.iter().any(|d| d == "node_modules"));
        assert_eq!(config.architecture.python_roots, vec!["src", "."]);
        assert_eq!(config.coupling.min_pair_count, 3);
        assert_eq!(config.coupling.max_files_per_commit, 80);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let raw = r#"{
            "critical_tags": ["@hot"],
            "architecture": { "js_aliases": { "@/": "src/" } },
            "checks": { "doctor": [] }
        }"#;
        let config = VibeConfig::from_json_str(raw).unwrap();
        assert_eq!(config.critical_tags, vec!["@hot"]);
        assert_eq!(config.architecture.js_aliases.get("@/").map(String::as_str), Some("src/"));
        assert!(config.architecture.enabled);
        assert_eq!(config.coupling.top, 20);
    }

    #[test]
    fn test_malformed_rule_is_rejected_alone() {
        let raw = r#"{ "architecture": { "rules": [
            { "name": "ok", "from_globs": ["a/**"], "to_globs": ["b/**"] },
            { "name": "bad", "from_globs": "not-a-list" },
            42
        ] } }"#;
        let config = VibeConfig::from_json_str(raw).unwrap();
        let (rules, issues) = config.architecture.rule_configs();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "ok");
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].entry, "bad");
        assert_eq!(issues[1].entry, "rules[2]");
    }

    #[test]
    fn test_selector_honours_excluded_dirs() {
        let selector = FileSelector::default();
        assert!(selector.matches("src/app/Program.cs"));
        assert!(selector.matches("main.py"));
        assert!(!selector.matches("node_modules/pkg/index.js"));
        assert!(!selector.matches("src/bin/Debug/App.cs"));
        assert!(!selector.matches("image.png"));
    }

    #[test]
    fn test_selector_reports_bad_glob() {
        let (selector, issues) =
            FileSelector::new(&["**/*.py".to_string(), "a/{b".to_string()], &[]);
        assert_eq!(issues.len(), 1);
        assert!(selector.matches("x/y.py"));
    }
}
