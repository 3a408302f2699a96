//! Python language extractor using tree-sitter

use std::path::Path;

use anyhow::Result;
use tree_sitter::Node;
use vibe_core::{Symbol, SymbolKind};

use crate::extractor::{ExtractionResult, LanguageExtractor, PyImport, RawImport};
use crate::parser_pool::{self, FileType};

pub struct PythonExtractor {
    critical_tags: Vec<String>,
}

impl PythonExtractor {
    pub fn new(critical_tags: Vec<String>) -> Self {
        Self { critical_tags }
    }

    fn line_of(node: Node) -> u32 {
        u32::try_from(node.start_position().row + 1).unwrap_or(u32::MAX)
    }

    /// Visit a definition list (module or class body), qualifying names with `scope`.
    fn visit_block(&self, block: Node, source: &[u8], scope: Option<&str>, symbols: &mut Vec<Symbol>) {
        let mut cursor = block.walk();
        for child in block.children(&mut cursor) {
            let (definition, decorators) = match child.kind() {
                "decorated_definition" => match child.child_by_field_name("definition") {
                    Some(def) => (def, Self::decorators(child, source)),
                    None => continue,
                },
                "function_definition" | "class_definition" => (child, String::new()),
                _ => continue,
            };
            self.visit_definition(definition, decorators, source, scope, symbols);
        }
    }

    fn visit_definition(
        &self,
        node: Node,
        decorators: String,
        source: &[u8],
        scope: Option<&str>,
        symbols: &mut Vec<Symbol>,
    ) {
        let Some(name) = node
            .child_by_field_name("name")
            .and_then(|n| n.utf8_text(source).ok())
        else {
            return;
        };
        let qualified = match scope {
            Some(scope) => format!("{}.{}", scope, name),
            None => name.to_string(),
        };
        let kind = match (node.kind(), scope) {
            ("class_definition", _) => SymbolKind::Class,
            (_, Some(_)) if name == "__init__" => SymbolKind::Constructor,
            (_, Some(_)) => SymbolKind::Method,
            _ => SymbolKind::Function,
        };
        let body = node.child_by_field_name("body");
        let doc = body.and_then(|b| Self::docstring(b, source)).unwrap_or_default();

        let mut symbol = Symbol::new(qualified.clone(), kind, Self::line_of(node));
        symbol.signature = Self::signature(node, body, source);
        symbol.exported = !name.starts_with('_');
        symbol.access = if symbol.exported { "public" } else { "private" }.to_string();
        symbol.tags = self
            .critical_tags
            .iter()
            .filter(|tag| doc.contains(tag.as_str()) || decorators.contains(tag.as_str()))
            .cloned()
            .collect();
        symbol.doc = doc;
        symbol.attributes = decorators;
        symbols.push(symbol);

        if kind == SymbolKind::Class {
            if let Some(body) = body {
                self.visit_block(body, source, Some(&qualified), symbols);
            }
        }
    }

    /// Header text up to the body, without the trailing colon.
    fn signature(node: Node, body: Option<Node>, source: &[u8]) -> String {
        let end = body.map_or(node.end_byte(), |b| b.start_byte());
        let header = source.get(node.start_byte()..end).unwrap_or_default();
        String::from_utf8_lossy(header)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .trim_end_matches(':')
            .to_string()
    }

    fn decorators(decorated: Node, source: &[u8]) -> String {
        let mut cursor = decorated.walk();
        decorated
            .children(&mut cursor)
            .filter(|c| c.kind() == "decorator")
            .filter_map(|c| c.utf8_text(source).ok())
            .map(str::trim)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn docstring(body: Node, source: &[u8]) -> Option<String> {
        let first = body.named_child(0)?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let string = first.named_child(0)?;
        if string.kind() != "string" {
            return None;
        }
        let text = string.utf8_text(source).ok()?;
        let text = text.trim_start_matches(|c: char| c.is_ascii_alphabetic());
        Some(text.trim_matches(|c| c == '"' || c == '\'').trim().to_string())
    }

    fn collect_imports(root: Node, source: &[u8]) -> Vec<RawImport> {
        let mut imports = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            match node.kind() {
                "import_statement" => imports.extend(Self::plain_import(node, source)),
                "import_from_statement" => imports.extend(Self::from_import(node, source)),
                _ => {
                    let mut cursor = node.walk();
                    let children: Vec<Node> = node.named_children(&mut cursor).collect();
                    stack.extend(children.into_iter().rev());
                }
            }
        }
        imports
    }

    fn dotted_text(node: Node, source: &[u8]) -> Option<String> {
        let target = if node.kind() == "aliased_import" {
            node.child_by_field_name("name")?
        } else {
            node
        };
        target.utf8_text(source).ok().map(str::to_string)
    }

    fn plain_import(node: Node, source: &[u8]) -> Vec<RawImport> {
        let line = Self::line_of(node);
        let mut cursor = node.walk();
        node.children_by_field_name("name", &mut cursor)
            .filter_map(|n| Self::dotted_text(n, source))
            .map(|module| {
                RawImport::Python(PyImport { module, names: Vec::new(), level: 0, line, from: false })
            })
            .collect()
    }

    fn from_import(node: Node, source: &[u8]) -> Option<RawImport> {
        let module_text = node
            .child_by_field_name("module_name")
            .and_then(|n| n.utf8_text(source).ok())?;
        let level = module_text.chars().take_while(|c| *c == '.').count();
        let module = module_text[level..].to_string();

        let mut cursor = node.walk();
        let names = node
            .children_by_field_name("name", &mut cursor)
            .filter_map(|n| Self::dotted_text(n, source))
            .collect();
        Some(RawImport::Python(PyImport {
            module,
            names,
            level,
            line: Self::line_of(node),
            from: true,
        }))
    }
}

impl LanguageExtractor for PythonExtractor {
    fn extract(&self, _path: &Path, content: &[u8]) -> Result<ExtractionResult> {
        let source_code = std::str::from_utf8(content)?;
        let tree = parser_pool::parse(FileType::Python, source_code)?;
        let root_node = tree.root_node();

        let mut symbols = Vec::new();
        self.visit_block(root_node, content, None, &mut symbols);
        let imports = Self::collect_imports(root_node, content);

        Ok(ExtractionResult { symbols, imports })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str) -> ExtractionResult {
        PythonExtractor::new(vec!["@critical".to_string()])
            .extract(Path::new("pkg/mod.py"), source.as_bytes())
            .unwrap()
    }

    fn py(import: &RawImport) -> &PyImport {
        match import {
            RawImport::Python(py) => py,
            other => panic!("unexpected import {:?}", other),
        }
    }

    const SOURCE: &str = r#"import os, json as j
from . import sibling
from ..core.models import User, Order as O
from pkg import *

def top(a, b=1) -> int:
    """Add things. @critical"""
    return a + b

class Repo(Base):
    """Stores rows."""

    def __init__(self):
        pass

    @staticmethod
    def _hidden():
        import inner_mod

    class Meta:
        pass

def _private():
    pass
"#;

    #[test]
    fn test_symbols() {
        let result = extract(SOURCE);
        let names: Vec<&str> = result.symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["top", "Repo", "Repo.__init__", "Repo._hidden", "Repo.Meta", "_private"]
        );

        let top = &result.symbols[0];
        assert_eq!(top.kind, SymbolKind::Function);
        assert_eq!(top.line, 6);
        assert_eq!(top.signature, "def top(a, b=1) -> int");
        assert_eq!(top.doc, "Add things. @critical");
        assert_eq!(top.tags, vec!["@critical"]);
        assert!(top.exported);

        let repo = &result.symbols[1];
        assert_eq!(repo.kind, SymbolKind::Class);
        assert_eq!(repo.doc, "Stores rows.");
        assert_eq!(result.symbols[2].kind, SymbolKind::Constructor);

        let hidden = &result.symbols[3];
        assert_eq!(hidden.kind, SymbolKind::Method);
        assert_eq!(hidden.attributes, "@staticmethod");
        assert!(!hidden.exported);
        assert!(!result.symbols[5].exported);
    }

    #[test]
    fn test_imports() {
        let result = extract(SOURCE);
        let imports: Vec<&PyImport> = result.imports.iter().map(py).collect();
        assert_eq!(imports.len(), 6);

        assert_eq!(imports[0].module, "os");
        assert_eq!(imports[1].module, "json");
        assert!(!imports[1].from);

        assert_eq!(imports[2].module, "");
        assert_eq!(imports[2].level, 1);
        assert_eq!(imports[2].names, vec!["sibling"]);

        assert_eq!(imports[3].module, "core.models");
        assert_eq!(imports[3].level, 2);
        assert_eq!(imports[3].names, vec!["User", "Order"]);
        assert_eq!(imports[3].line, 3);

        assert_eq!(imports[4].module, "pkg");
        assert!(imports[4].names.is_empty());

        assert_eq!(imports[5].module, "inner_mod");
        assert_eq!(imports[5].line, 18);
    }

    #[test]
    fn test_broken_source_is_not_an_error() {
        let result = PythonExtractor::new(Vec::new())
            .extract(Path::new("bad.py"), b"import a\n\ndef broken(:\n");
        assert!(result.is_ok());
    }
}
