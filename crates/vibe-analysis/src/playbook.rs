//! Refactor playbooks for boundary violations and coupling leaks
//!
//! Both endpoints of an offending edge are bucketed by the words in their
//! paths; the bucket pairing decides which playbooks are offered and how
//! their applicability is worded.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Shared,
    Infra,
    Domain,
    Ui,
    Data,
    Unknown,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Shared => "shared",
            Bucket::Infra => "infra",
            Bucket::Domain => "domain",
            Bucket::Ui => "ui",
            Bucket::Data => "data",
            Bucket::Unknown => "unknown",
        }
    }
}

/// Checked in order; the first bucket with a matching token wins.
const KEYWORDS: &[(Bucket, &[&str])] = &[
    (Bucket::Shared, &["shared", "common", "contracts", "abstractions", "kernel", "utils", "util"]),
    (
        Bucket::Infra,
        &["infra", "infrastructure", "adapter", "persistence", "repository", "gateway", "external", "integration", "db", "sql"],
    ),
    (Bucket::Ui, &["ui", "view", "component", "pages", "screen", "widget", "frontend", "presentation", "controller"]),
    (Bucket::Data, &["data", "dto", "schema", "migration", "storage", "entity", "entities"]),
    (Bucket::Domain, &["domain", "core", "model", "business", "logic", "service"]),
];

fn keyword_matches(token: &str, keyword: &str) -> bool {
    // Short keywords ("ui", "db") only match whole tokens.
    if keyword.len() <= 3 {
        token == keyword
    } else {
        token.contains(keyword)
    }
}

/// Bucket a path by keyword containment over its lowercase tokens.
pub fn classify(path: &str) -> Bucket {
    let lowered = path.to_lowercase();
    let tokens: Vec<&str> = lowered
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    KEYWORDS
        .iter()
        .find(|(_, words)| {
            tokens
                .iter()
                .any(|token| words.iter().any(|word| keyword_matches(token, word)))
        })
        .map_or(Bucket::Unknown, |(bucket, _)| *bucket)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playbook {
    pub name: String,
    pub applicability: String,
    pub steps: Vec<String>,
}

fn playbook(name: &str, applicability: String, steps: &[&str]) -> Playbook {
    Playbook {
        name: name.to_string(),
        applicability,
        steps: steps.iter().map(|s| s.to_string()).collect(),
    }
}

fn dependency_inversion(from: Bucket, to: Bucket) -> Playbook {
    playbook(
        "dependency_inversion",
        format!(
            "{} code depends directly on {} code; introduce an interface owned by the caller and inject the implementation",
            from.as_str(),
            to.as_str()
        ),
        &[
            "Define an interface next to the calling code",
            "Implement it in the target module",
            "Wire the implementation at the composition root",
        ],
    )
}

fn anti_corruption_layer(from: Bucket, to: Bucket) -> Playbook {
    playbook(
        "anti_corruption_layer",
        format!(
            "{} and {} meet directly; translate between their models at a single seam",
            from.as_str(),
            to.as_str()
        ),
        &[
            "Add a translator that maps the foreign types",
            "Route every crossing call through the translator",
            "Keep foreign types out of the domain signatures",
        ],
    )
}

fn shared_contract(from: Bucket, to: Bucket) -> Playbook {
    let side = if from == Bucket::Shared { to } else { from };
    playbook(
        "shared_contract_extraction",
        format!(
            "shared code is entangled with {} code; move the common contract into the shared module",
            side.as_str()
        ),
        &[
            "Identify the types both sides need",
            "Move them into a contracts module with no outward dependencies",
            "Point both sides at the contracts module",
        ],
    )
}

fn facade(from: Bucket, to: Bucket) -> Playbook {
    playbook(
        "facade_application_service",
        format!(
            "{} code reaches into {} details; expose a narrow application service instead",
            from.as_str(),
            to.as_str()
        ),
        &[
            "Add an application service covering the use case",
            "Call the service from the outer layer",
            "Make the internals non-public",
        ],
    )
}

/// Playbooks for an edge from `from` to `to`, most specific first.
pub fn playbooks_for(from: &str, to: &str) -> Vec<Playbook> {
    let (a, b) = (classify(from), classify(to));
    let pair = |x: Bucket, y: Bucket| (a == x && b == y) || (a == y && b == x);
    let mut out = Vec::new();

    if pair(Bucket::Infra, Bucket::Domain) || pair(Bucket::Data, Bucket::Domain) {
        out.push(anti_corruption_layer(a, b));
        if a == Bucket::Domain {
            out.push(dependency_inversion(a, b));
        }
    }
    if (a == Bucket::Shared) != (b == Bucket::Shared) {
        out.push(shared_contract(a, b));
    }
    if a == Bucket::Ui && matches!(b, Bucket::Infra | Bucket::Data | Bucket::Domain) {
        out.push(facade(a, b));
    }
    if out.is_empty() {
        out.push(dependency_inversion(a, b));
        out.push(facade(a, b));
    }
    out
}
