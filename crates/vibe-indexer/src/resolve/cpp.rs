//! `#include` resolution
//!
//! Search order: the includer's directory, the repository root, then any
//! indexed file whose path ends with the include text. Suffix candidates are
//! ranked by the longest shared directory prefix with the includer, then the
//! shortest path, then lexicographically.

use std::collections::HashMap;

use vibe_core::{Language, join_rel, parent_dir};

use super::ResolverContext;

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

pub(crate) fn header_index(sorted_paths: &[&String]) -> HashMap<String, Vec<String>> {
    let mut index: HashMap<String, Vec<String>> = HashMap::new();
    for path in sorted_paths {
        if Language::from_path(std::path::Path::new(path.as_str())).is_native() {
            index
                .entry(file_name(path).to_string())
                .or_default()
                .push(path.to_string());
        }
    }
    index
}

/// Number of leading directory components two directories share.
fn common_dir_depth(a: &str, b: &str) -> usize {
    a.split('/')
        .zip(b.split('/'))
        .take_while(|(x, y)| !x.is_empty() && x == y)
        .count()
}

pub(crate) fn resolve(ctx: &ResolverContext, from: &str, include: &str) -> Option<String> {
    let include = include.replace('\\', "/");

    if let Some(local) = join_rel(parent_dir(from), &include) {
        if ctx.contains(&local) {
            return Some(local);
        }
    }
    if let Some(rooted) = join_rel("", &include) {
        if ctx.contains(&rooted) {
            return Some(rooted);
        }
    }

    let suffix = format!("/{}", include.trim_start_matches("./"));
    let includer_dir = parent_dir(from);
    ctx.headers
        .get(file_name(&include))?
        .iter()
        .filter(|candidate| candidate.as_str() == include || candidate.ends_with(&suffix))
        .max_by(|a, b| {
            common_dir_depth(includer_dir, parent_dir(a))
                .cmp(&common_dir_depth(includer_dir, parent_dir(b)))
                .then_with(|| b.len().cmp(&a.len()))
                .then_with(|| b.cmp(a))
        })
        .cloned()
}
