//! Python `import` / `from ... import` resolution

use std::collections::HashMap;

use vibe_core::parent_dir;

use super::ResolverContext;
use crate::extractor::PyImport;

/// Map dotted module names to files, one pass per source root in priority order.
pub(crate) fn module_index(sorted_paths: &[&String], roots: &[String]) -> HashMap<String, String> {
    let mut index = HashMap::new();
    for root in roots {
        let root = root.trim_matches('/');
        let prefix = if root.is_empty() || root == "." {
            String::new()
        } else {
            format!("{}/", root)
        };
        for path in sorted_paths {
            let Some(rel) = path.strip_prefix(prefix.as_str()) else {
                continue;
            };
            let Some(stem) = rel.strip_suffix(".py") else {
                continue;
            };
            let stem = match stem.strip_suffix("/__init__") {
                Some(package) => package,
                None if stem == "__init__" => continue,
                None => stem,
            };
            index
                .entry(stem.replace('/', "."))
                .or_insert_with(|| path.to_string());
        }
    }
    index
}

fn longest_prefix(ctx: &ResolverContext, dotted: &str) -> Option<String> {
    let parts: Vec<&str> = dotted.split('.').filter(|p| !p.is_empty()).collect();
    (1..=parts.len())
        .rev()
        .find_map(|n| ctx.py_modules.get(&parts[..n].join(".")).cloned())
}

fn join(base: &str, rest: &str) -> String {
    match (base.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{}/{}", base, rest),
    }
}

/// `<x>.py`, then `<x>/__init__.py`.
fn module_file(ctx: &ResolverContext, x: &str) -> Option<String> {
    if x.is_empty() {
        return None;
    }
    [format!("{}.py", x), format!("{}/__init__.py", x)]
        .into_iter()
        .find(|candidate| ctx.contains(candidate))
}

fn package_init(ctx: &ResolverContext, dir: &str) -> Option<String> {
    let candidate = join(dir, "__init__.py");
    ctx.contains(&candidate).then_some(candidate)
}

pub(crate) fn resolve(ctx: &ResolverContext, from: &str, import: &PyImport) -> Vec<String> {
    if import.level == 0 {
        if !import.from || import.names.is_empty() {
            return longest_prefix(ctx, &import.module).into_iter().collect();
        }
        // `from M import n`: the submodule `M.n` wins over `M` itself.
        return import
            .names
            .iter()
            .filter_map(|name| longest_prefix(ctx, &format!("{}.{}", import.module, name)))
            .collect();
    }

    let mut base = parent_dir(from);
    for _ in 1..import.level {
        if base.is_empty() {
            return Vec::new();
        }
        base = parent_dir(base);
    }
    let target = join(base, &import.module.replace('.', "/"));
    let fallback = || {
        if import.module.is_empty() {
            package_init(ctx, &target)
        } else {
            module_file(ctx, &target)
        }
    };

    if import.names.is_empty() {
        return fallback().into_iter().collect();
    }
    import
        .names
        .iter()
        .filter_map(|name| module_file(ctx, &join(&target, &name.replace('.', "/"))).or_else(fallback))
        .collect()
}

/// Source-like rendering of the import for edge details.
pub(crate) fn describe(import: &PyImport) -> String {
    let module = format!("{}{}", ".".repeat(import.level), import.module);
    if import.from {
        let names = if import.names.is_empty() { "*".to_string() } else { import.names.join(", ") };
        format!("from {} import {}", module, names)
    } else {
        format!("import {}", module)
    }
}
