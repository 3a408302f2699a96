//! JavaScript/TypeScript extractor
//!
//! Regex-based: declarations are matched per line, import specifiers over the
//! whole text so multi-line `import { ... } from` statements are still found.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use vibe_core::{Symbol, SymbolKind};

use crate::extractor::{ExtractionResult, LanguageExtractor, RawImport};

static FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)\s*[<(]")
        .expect("function regex")
});

static CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)")
        .expect("class regex")
});

static ARROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*(?::[^=]+)?=>",
    )
    .expect("arrow regex")
});

static IMPORT_RES: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        // import x from '...'; import { a } from '...'; import '...'
        Regex::new(r#"(?m)^\s*import\s+(?:type\s+)?(?:[^'";]*?\s+from\s+)?['"]([^'"]+)['"]"#),
        // export * from '...'; export { a } from '...'
        Regex::new(r#"(?m)^\s*export\s+(?:type\s+)?(?:\*(?:\s+as\s+[\w$]+)?|\{[^}]*\})\s*from\s+['"]([^'"]+)['"]"#),
        Regex::new(r#"\brequire\s*\(\s*['"]([^'"]+)['"]\s*\)"#),
        Regex::new(r#"\bimport\s*\(\s*['"]([^'"]+)['"]\s*\)"#),
    ]
    .map(|re| re.expect("import regex"))
});

pub struct JavaScriptExtractor;

impl JavaScriptExtractor {
    fn declaration(line: &str) -> Option<(bool, String, SymbolKind)> {
        if let Some(caps) = CLASS_RE.captures(line) {
            return Some((caps.get(1).is_some(), caps[2].to_string(), SymbolKind::Class));
        }
        for re in [&*FUNCTION_RE, &*ARROW_RE] {
            if let Some(caps) = re.captures(line) {
                return Some((caps.get(1).is_some(), caps[2].to_string(), SymbolKind::Function));
            }
        }
        None
    }
}

impl LanguageExtractor for JavaScriptExtractor {
    fn extract(&self, _path: &Path, content: &[u8]) -> Result<ExtractionResult> {
        let source = std::str::from_utf8(content)?;

        let mut symbols = Vec::new();
        for (idx, line) in source.lines().enumerate() {
            let Some((exported, name, kind)) = Self::declaration(line) else {
                continue;
            };
            let mut symbol = Symbol::new(name, kind, line_no(idx));
            symbol.signature = line.trim().trim_end_matches('{').trim().to_string();
            symbol.exported = exported;
            symbol.access = if exported { "export" } else { "" }.to_string();
            symbols.push(symbol);
        }

        let mut found: Vec<(usize, String)> = Vec::new();
        for re in IMPORT_RES.iter() {
            for caps in re.captures_iter(source) {
                if let Some(spec) = caps.get(1) {
                    found.push((spec.start(), spec.as_str().to_string()));
                }
            }
        }
        found.sort();
        found.dedup();
        let imports = found
            .into_iter()
            .map(|(offset, specifier)| RawImport::Script {
                line: line_at(source, offset),
                specifier,
            })
            .collect();

        Ok(ExtractionResult { symbols, imports })
    }
}

fn line_no(idx: usize) -> u32 {
    u32::try_from(idx + 1).unwrap_or(u32::MAX)
}

fn line_at(source: &str, offset: usize) -> u32 {
    let newlines = source.as_bytes()[..offset].iter().filter(|b| **b == b'\n').count();
    line_no(newlines)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"import React from 'react';
import {
  a,
  b,
} from './util';
import './styles.css';
export * from '../shared/types';
export { helper } from "./helper";
const fs = require('fs');

export default function App() {
  const Page = await import('./pages/Home');
}

export class Store extends Base {}
class Internal {}
export const useThing = async (x) => x;
const double = n => n * 2;
function* gen() {}
"#;

    fn specifiers(result: &ExtractionResult) -> Vec<(&str, u32)> {
        result
            .imports
            .iter()
            .map(|i| match i {
                RawImport::Script { specifier, line } => (specifier.as_str(), *line),
                other => panic!("unexpected {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_all_import_forms() {
        let result = JavaScriptExtractor.extract(Path::new("web/app.tsx"), SOURCE.as_bytes()).unwrap();
        assert_eq!(
            specifiers(&result),
            vec![
                ("react", 1),
                ("./util", 5),
                ("./styles.css", 6),
                ("../shared/types", 7),
                ("./helper", 8),
                ("fs", 9),
                ("./pages/Home", 12),
            ]
        );
    }

    #[test]
    fn test_declarations() {
        let result = JavaScriptExtractor.extract(Path::new("web/app.tsx"), SOURCE.as_bytes()).unwrap();
        let found: Vec<(&str, bool)> = result
            .symbols
            .iter()
            .map(|s| (s.name.as_str(), s.exported))
            .collect();
        assert_eq!(
            found,
            vec![
                ("App", true),
                ("Store", true),
                ("Internal", false),
                ("useThing", true),
                ("double", false),
                ("gen", false),
            ]
        );
        assert_eq!(result.symbols[1].kind, SymbolKind::Class);
        assert_eq!(result.symbols[0].line, 11);
    }
}
