//! Language extractor trait definition

use std::path::Path;

use vibe_core::Symbol;

/// A Python import statement before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyImport {
    /// Dotted module text without leading dots (`a.b` in `from ..a.b import c`).
    pub module: String,
    /// Imported names for `from` imports; empty for plain `import`.
    pub names: Vec<String>,
    /// Number of leading dots; 0 for absolute imports.
    pub level: usize,
    pub line: u32,
    /// Whether this was a `from ... import ...` statement.
    pub from: bool,
}

/// An import reference as written in source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawImport {
    Python(PyImport),
    /// JS/TS module specifier from any import form.
    Script { specifier: String, line: u32 },
    /// `#include` target; `angled` for `<...>`.
    Include { target: String, angled: bool, line: u32 },
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    pub symbols: Vec<Symbol>,
    pub imports: Vec<RawImport>,
}

pub trait LanguageExtractor: Send + Sync {
    fn extract(&self, path: &Path, content: &[u8]) -> anyhow::Result<ExtractionResult>;
}
