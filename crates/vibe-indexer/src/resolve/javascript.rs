//! JS/TS module specifier resolution

use std::path::Path;

use vibe_core::{join_rel, normalize_rel_path, parent_dir};

use super::ResolverContext;

const EXTENSIONS: [&str; 7] = ["", ".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs"];

/// Repo-relative base path for a specifier, before extension probing.
fn base_path(ctx: &ResolverContext, from: &str, specifier: &str) -> Option<String> {
    if specifier.starts_with("./") || specifier.starts_with("../") || specifier == "." || specifier == ".." {
        return join_rel(parent_dir(from), specifier);
    }
    let (prefix, target) = ctx
        .js_aliases
        .iter()
        .find(|(prefix, _)| specifier.starts_with(prefix.as_str()))?;
    let rest = specifier[prefix.len()..].trim_start_matches('/');
    let substituted = format!("{}/{}", target.trim_end_matches('/'), rest);
    normalize_rel_path(Path::new(substituted.trim_start_matches('/')))
}

/// Resolve a specifier to an indexed file; bare package names resolve to nothing.
pub(crate) fn resolve(ctx: &ResolverContext, from: &str, specifier: &str) -> Option<String> {
    let base = base_path(ctx, from, specifier)?;
    let direct = EXTENSIONS.iter().map(|ext| format!("{}{}", base, ext));
    let index = EXTENSIONS.iter().map(|ext| {
        if base.is_empty() {
            format!("index{}", ext)
        } else {
            format!("{}/index{}", base, ext)
        }
    });
    direct.chain(index).find(|candidate| ctx.contains(candidate))
}
