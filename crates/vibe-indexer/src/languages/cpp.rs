//! C/C++ extractor: type and function definitions plus `#include` directives

use std::path::Path;
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use vibe_core::{Symbol, SymbolKind};

use crate::extractor::{ExtractionResult, LanguageExtractor, RawImport};

static INCLUDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*#\s*include\s*([<"])([^>"]+)[>"]"#).expect("include regex")
});

static NAMESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*namespace\s+([\w:]+)\s*\{?\s*$").expect("namespace regex"));

static TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:template\s*<[^>]*>\s*)?(class|struct|enum(?:\s+class|\s+struct)?)\s+(?:[A-Z_][A-Z0-9_]*\s+)?(\w+)\s*(?:final\s*)?(?::[^;{]*)?(?:\{.*)?$")
        .expect("type regex")
});

static FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*((?:(?:static|inline|virtual|constexpr|extern|explicit|friend)\s+)*)[\w:<>,]+[\s*&]+([A-Za-z_~][\w:~]*)\s*\([^;]*$")
        .expect("function regex")
});

const CONTROL_WORDS: [&str; 8] = ["if", "for", "while", "switch", "return", "else", "sizeof", "catch"];

pub struct CppExtractor;

fn line_no(idx: usize) -> u32 {
    u32::try_from(idx + 1).unwrap_or(u32::MAX)
}

/// Whether a body opens on this line or the next non-empty one.
fn opens_body(lines: &[&str], idx: usize) -> bool {
    if lines[idx].contains('{') {
        return true;
    }
    lines
        .iter()
        .skip(idx + 1)
        .map(|l| l.trim())
        .find(|l| !l.is_empty())
        .is_some_and(|l| l.starts_with('{') || l.starts_with(':'))
}

impl LanguageExtractor for CppExtractor {
    fn extract(&self, _path: &Path, content: &[u8]) -> Result<ExtractionResult> {
        // Headers are often Latin-1; take what decodes.
        let source = String::from_utf8_lossy(content);
        let lines: Vec<&str> = source.lines().collect();

        let mut symbols = Vec::new();
        let mut imports = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            if let Some(caps) = INCLUDE_RE.captures(line) {
                imports.push(RawImport::Include {
                    target: caps[2].trim().to_string(),
                    angled: &caps[1] == "<",
                    line: line_no(idx),
                });
                continue;
            }
            if line.trim_start().starts_with("//") {
                continue;
            }

            if let Some(caps) = NAMESPACE_RE.captures(line) {
                let mut symbol = Symbol::new(&caps[1], SymbolKind::Namespace, line_no(idx));
                symbol.signature = line.trim().trim_end_matches('{').trim().to_string();
                symbols.push(symbol);
            } else if let Some(caps) = TYPE_RE.captures(line) {
                let kind = match caps[1].split_whitespace().next() {
                    Some("class") => SymbolKind::Class,
                    Some("struct") => SymbolKind::Struct,
                    _ => SymbolKind::Enum,
                };
                let mut symbol = Symbol::new(&caps[2], kind, line_no(idx));
                symbol.signature = line.trim().trim_end_matches('{').trim().to_string();
                symbol.exported = true;
                symbols.push(symbol);
            } else if let Some(caps) = FUNCTION_RE.captures(line) {
                let name = &caps[2];
                if CONTROL_WORDS.contains(&name) || !opens_body(&lines, idx) {
                    continue;
                }
                let kind = if name.contains("::") { SymbolKind::Method } else { SymbolKind::Function };
                let is_static = caps[1].split_whitespace().any(|w| w == "static");
                let mut symbol = Symbol::new(name, kind, line_no(idx));
                symbol.signature = line.trim().trim_end_matches('{').trim().to_string();
                symbol.exported = !is_static;
                symbol.access = if is_static { "static" } else { "" }.to_string();
                symbols.push(symbol);
            }
        }

        Ok(ExtractionResult { symbols, imports })
    }
}
