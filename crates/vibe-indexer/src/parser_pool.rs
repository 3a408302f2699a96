//! Per-thread tree-sitter parsers
//!
//! `tree_sitter::Parser` is not `Sync`, and sweeps run extraction on rayon
//! worker threads. Each worker lazily builds its own parser per grammar and
//! reuses it for every file it handles.

use std::cell::RefCell;
use std::collections::HashMap;

use anyhow::{Result, anyhow};
use tree_sitter::{Language, Parser, Tree};

/// Grammars the indexer parses with tree-sitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Python,
}

impl FileType {
    /// Get the tree-sitter language for this file type
    pub fn get_language(&self) -> Language {
        match self {
            FileType::Python => tree_sitter_python::LANGUAGE.into(),
        }
    }
}

thread_local! {
    static PARSERS: RefCell<HashMap<FileType, Parser>> = RefCell::new(HashMap::new());
}

/// Parse `source` with this thread's parser for `file_type`.
pub fn parse(file_type: FileType, source: &str) -> Result<Tree> {
    PARSERS.with(|cell| {
        let mut parsers = cell.borrow_mut();
        let parser = match parsers.entry(file_type) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let mut parser = Parser::new();
                parser
                    .set_language(&file_type.get_language())
                    .map_err(|e| anyhow!("Failed to set language: {}", e))?;
                tracing::trace!("Created {:?} parser on {:?}", file_type, std::thread::current().id());
                entry.insert(parser)
            }
        };
        parser
            .parse(source, None)
            .ok_or_else(|| anyhow!("Failed to parse content"))
    })
}
