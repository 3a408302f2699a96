//! Architecture boundary rules evaluated over dependency edges

use std::collections::{BTreeMap, HashSet};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vibe_core::{ArchitectureConfig, ConfigIssue, DependencyEdge, EdgeKind, RuleConfig, VibeError};

use crate::playbook::{Playbook, playbooks_for};

pub const DEFAULT_MAX_VIOLATIONS: usize = 200;

/// A validated rule: edges from `from` paths to `to` paths are not allowed.
#[derive(Debug, Clone)]
pub struct BoundaryRule {
    pub name: String,
    pub reason: String,
    pub kinds: Vec<EdgeKind>,
    from: GlobSet,
    to: GlobSet,
}

impl BoundaryRule {
    pub fn matches(&self, edge: &DependencyEdge) -> bool {
        if edge.is_self_edge() {
            return false;
        }
        (self.kinds.is_empty() || self.kinds.contains(&edge.kind))
            && self.from.is_match(&edge.from)
            && self.to.is_match(&edge.to)
    }
}

fn build_globs(rule: &str, field: &str, patterns: &[String]) -> Result<GlobSet, VibeError> {
    if patterns.is_empty() {
        return Err(VibeError::Config {
            entry: rule.to_string(),
            reason: format!("{} is empty", field),
        });
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| VibeError::Config {
            entry: rule.to_string(),
            reason: format!("bad glob in {}: {}", field, e),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| VibeError::Config {
        entry: rule.to_string(),
        reason: e.to_string(),
    })
}

fn compile_rule(config: &RuleConfig) -> Result<BoundaryRule, VibeError> {
    let name = config.name.trim();
    if name.is_empty() {
        return Err(VibeError::Config { entry: "<unnamed>".to_string(), reason: "rule has no name".to_string() });
    }
    let from = build_globs(name, "from_globs", &config.from_globs)?;
    let to = build_globs(name, "to_globs", &config.to_globs)?;
    let kinds = config
        .kinds
        .iter()
        .map(|k| k.parse::<EdgeKind>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| VibeError::Config { entry: name.to_string(), reason: e.to_string() })?;
    Ok(BoundaryRule {
        name: name.to_string(),
        reason: config.reason.clone(),
        kinds,
        from,
        to,
    })
}

/// Validate rule configs. Bad rules are reported and skipped; the rest apply.
pub fn compile_rules(configs: &[RuleConfig]) -> (Vec<BoundaryRule>, Vec<ConfigIssue>) {
    let mut rules = Vec::new();
    let mut issues = Vec::new();
    for config in configs {
        match compile_rule(config) {
            Ok(rule) => rules.push(rule),
            Err(e) => {
                warn!("Rejecting boundary rule: {}", e);
                issues.push(ConfigIssue::from(e));
            }
        }
    }
    (rules, issues)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub rule: String,
    pub kind: EdgeKind,
    pub from: String,
    pub to: String,
    pub line: Option<u32>,
    pub detail: Option<String>,
    pub reason: String,
    pub playbooks: Vec<Playbook>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryReport {
    pub generated_at: String,
    pub enabled: bool,
    pub rules_checked: usize,
    pub edges_checked: usize,
    pub max_violations: usize,
    pub truncated: bool,
    pub counts: BTreeMap<String, usize>,
    pub violations: Vec<Violation>,
    pub rejected_rules: Vec<ConfigIssue>,
}

impl BoundaryReport {
    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }
}

pub struct BoundaryEngine {
    enabled: bool,
    rules: Vec<BoundaryRule>,
    issues: Vec<ConfigIssue>,
    max_violations: usize,
}

impl BoundaryEngine {
    /// Compile the rules of an architecture config. Rejected entries are kept for the report.
    pub fn new(architecture: &ArchitectureConfig, max_violations: usize) -> Self {
        let (configs, mut issues) = architecture.rule_configs();
        let (rules, rule_issues) = compile_rules(&configs);
        issues.extend(rule_issues);
        Self {
            enabled: architecture.enabled,
            rules,
            issues,
            max_violations,
        }
    }

    pub fn rules(&self) -> &[BoundaryRule] {
        &self.rules
    }

    /// Evaluate coarse edges, then code edges, until the violation cap.
    pub fn check(&self, coarse_edges: &[DependencyEdge], code_edges: &[DependencyEdge]) -> BoundaryReport {
        let mut report = BoundaryReport {
            generated_at: chrono::Utc::now().to_rfc3339(),
            enabled: self.enabled,
            rules_checked: self.rules.len(),
            edges_checked: 0,
            max_violations: self.max_violations,
            truncated: false,
            counts: BTreeMap::new(),
            violations: Vec::new(),
            rejected_rules: self.issues.clone(),
        };
        if !self.enabled {
            debug!("Boundary checks disabled");
            return report;
        }

        let mut seen: HashSet<(usize, EdgeKind, &str, &str)> = HashSet::new();
        'edges: for edge in coarse_edges.iter().chain(code_edges) {
            report.edges_checked += 1;
            for (idx, rule) in self.rules.iter().enumerate() {
                if !rule.matches(edge) || !seen.insert((idx, edge.kind, &edge.from, &edge.to)) {
                    continue;
                }
                if report.violations.len() >= self.max_violations {
                    report.truncated = true;
                    break 'edges;
                }
                *report.counts.entry(rule.name.clone()).or_default() += 1;
                report.violations.push(Violation {
                    rule: rule.name.clone(),
                    kind: edge.kind,
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    line: edge.line,
                    detail: edge.detail.clone(),
                    reason: rule.reason.clone(),
                    playbooks: playbooks_for(&edge.from, &edge.to),
                });
            }
        }

        debug!(
            "Checked {} edges against {} rules: {} violations",
            report.edges_checked,
            self.rules.len(),
            report.violations.len()
        );
        report
    }
}
