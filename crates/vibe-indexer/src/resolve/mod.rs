//! Turn raw import references into verified file-to-file edges
//!
//! A [`ResolverContext`] is built once per sweep from the complete set of
//! enumerated paths. Every produced edge points at a path in that set;
//! references that cannot be matched are dropped with a `trace!`.

pub mod cpp;
pub mod javascript;
pub mod project;
pub mod python;

use std::collections::{HashMap, HashSet};

use vibe_core::{ArchitectureConfig, DependencyEdge, EdgeKind, Language};

use crate::extractor::RawImport;

pub struct ResolverContext {
    files: HashSet<String>,
    py_modules: HashMap<String, String>,
    /// Alias prefix and target, longest prefix first.
    js_aliases: Vec<(String, String)>,
    /// File name to every indexed C/C++ path carrying it.
    headers: HashMap<String, Vec<String>>,
}

impl ResolverContext {
    pub fn new<I, S>(paths: I, architecture: &ArchitectureConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let files: HashSet<String> = paths.into_iter().map(Into::into).collect();
        let mut sorted: Vec<&String> = files.iter().collect();
        sorted.sort();

        let py_modules = python::module_index(&sorted, &architecture.python_roots);
        let headers = cpp::header_index(&sorted);
        let mut js_aliases: Vec<(String, String)> = architecture
            .js_aliases
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        js_aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        ResolverContext { files, py_modules, js_aliases, headers }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains(path)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Resolve every import of `from`, dropping misses, self-edges and duplicates.
    pub fn resolve(&self, from: &str, language: Language, imports: &[RawImport]) -> Vec<DependencyEdge> {
        let mut seen: HashSet<(String, EdgeKind)> = HashSet::new();
        let mut edges = Vec::new();

        for import in imports {
            let (targets, kind, line, detail) = match import {
                RawImport::Python(py) => {
                    let kind = if py.from { EdgeKind::PyFrom } else { EdgeKind::PyImport };
                    let detail = python::describe(py);
                    (python::resolve(self, from, py), kind, py.line, detail)
                }
                RawImport::Script { specifier, line } if language.is_script() => (
                    javascript::resolve(self, from, specifier).into_iter().collect(),
                    EdgeKind::JsImport,
                    *line,
                    specifier.clone(),
                ),
                RawImport::Include { target, line, .. } if language.is_native() => (
                    cpp::resolve(self, from, target).into_iter().collect(),
                    EdgeKind::CppInclude,
                    *line,
                    target.clone(),
                ),
                _ => continue,
            };

            if targets.is_empty() {
                tracing::trace!("Unresolved {} in {}: {}", kind, from, detail);
                continue;
            }
            for to in targets {
                if to == from || !seen.insert((to.clone(), kind)) {
                    continue;
                }
                let mut edge = DependencyEdge::new(from, to, kind);
                edge.line = Some(line);
                edge.detail = Some(detail.clone());
                edges.push(edge);
            }
        }
        edges
    }
}
