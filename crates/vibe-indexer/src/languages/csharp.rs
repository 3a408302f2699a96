//! C# symbol extractor
//!
//! A line-oriented recognizer, not a parser. It tracks brace depth to know
//! which namespace and type a declaration sits in, and looks upward from each
//! declaration for `///` doc comments and `[Attribute]` lines.
//!
//! Known approximations: a generic return type whose last token equals the
//! member name is classified as a constructor, declarations split before the
//! identifier are missed, and a type declared on one line with its body only
//! yields the first member of that body.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use vibe_core::{Symbol, SymbolKind};

use crate::extractor::{ExtractionResult, LanguageExtractor};

static NAMESPACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^namespace\s+([\w.]+)\s*(;)?").expect("namespace regex")
});

static TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^((?:(?:public|private|protected|internal|static|sealed|abstract|partial|readonly|ref|unsafe|new|file)\s+)*)(class|struct|interface|enum|record)(?:\s+(?:class|struct))?\s+(\w+)",
    )
    .expect("type regex")
});

static MEMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^((?:(?:public|private|protected|internal|static|virtual|override|abstract|async|sealed|extern|unsafe|new|partial|readonly)\s+)*)(?:([\w.<>\[\],?\s]+?)\s+)?(\w+)\s*(?:<[^>()]*>)?\s*\(",
    )
    .expect("member regex")
});

static XML_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("xml tag regex"));

const MAX_ATTRIBUTE_LINES: usize = 3;
const MAX_SIGNATURE_LINES: usize = 12;
const ACCESS_WORDS: [&str; 4] = ["public", "private", "protected", "internal"];

/// Words that open statements or expressions, never member declarations.
const STATEMENT_WORDS: [&str; 22] = [
    "if", "else", "for", "foreach", "while", "do", "switch", "case", "catch", "using", "lock",
    "return", "await", "throw", "yield", "goto", "new", "nameof", "typeof", "sizeof", "default",
    "when",
];

pub struct CSharpExtractor {
    critical_tags: Vec<String>,
}

impl CSharpExtractor {
    pub fn new(critical_tags: Vec<String>) -> Self {
        Self { critical_tags }
    }
}

/// An open `{ ... }` region that qualifies names declared inside it.
#[derive(Debug)]
struct Scope {
    name: String,
    /// None for namespaces.
    kind: Option<SymbolKind>,
    depth: usize,
}

#[derive(Debug, Default)]
struct ScopeTracker {
    file_namespace: Option<String>,
    scopes: Vec<Scope>,
    pending: Option<(String, Option<SymbolKind>)>,
    depth: usize,
    in_block_comment: bool,
}

impl ScopeTracker {
    fn qualify(&self, name: &str) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(ns) = &self.file_namespace {
            parts.push(ns);
        }
        parts.extend(self.scopes.iter().map(|s| s.name.as_str()));
        parts.push(name);
        parts.join(".")
    }

    fn enclosing_type(&self) -> Option<&Scope> {
        self.scopes.iter().rev().find(|s| s.kind.is_some())
    }

    /// True when the current line sits directly in a type body, not in a
    /// method body or a namespace.
    fn in_type_body(&self) -> bool {
        self.scopes.last().is_some_and(|s| s.kind.is_some() && s.depth == self.depth)
    }

    /// Feed one line's braces, skipping strings, chars and comments.
    fn consume(&mut self, line: &str) {
        let mut chars = line.chars().peekable();
        let mut in_string: Option<char> = None;
        while let Some(c) = chars.next() {
            if self.in_block_comment {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    self.in_block_comment = false;
                }
                continue;
            }
            if let Some(quote) = in_string {
                if c == '\\' {
                    chars.next();
                } else if c == quote {
                    in_string = None;
                }
                continue;
            }
            match c {
                '"' | '\'' => in_string = Some(c),
                '/' if chars.peek() == Some(&'/') => break,
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    self.in_block_comment = true;
                }
                '{' => {
                    self.depth += 1;
                    if let Some((name, kind)) = self.pending.take() {
                        self.scopes.push(Scope { name, kind, depth: self.depth });
                    }
                }
                '}' => {
                    if self.scopes.last().is_some_and(|s| s.depth == self.depth) {
                        self.scopes.pop();
                    }
                    self.depth = self.depth.saturating_sub(1);
                }
                _ => {}
            }
        }
    }
}

impl LanguageExtractor for CSharpExtractor {
    fn extract(&self, _path: &Path, content: &[u8]) -> Result<ExtractionResult> {
        let source = std::str::from_utf8(content)?;
        let lines: Vec<&str> = source.lines().collect();
        let mut tracker = ScopeTracker::default();
        let mut symbols = Vec::new();

        for (idx, raw) in lines.iter().enumerate() {
            let trimmed = raw.trim();
            if tracker.in_block_comment || trimmed.starts_with("//") {
                tracker.consume(raw);
                continue;
            }
            let (inline_attributes, decl) = split_leading_attributes(trimmed);
            if decl.is_empty() {
                tracker.consume(raw);
                continue;
            }

            if let Some(caps) = NAMESPACE_RE.captures(decl) {
                let name = caps[1].to_string();
                let mut symbol = Symbol::new(tracker.qualify(&name), SymbolKind::Namespace, line_no(idx));
                symbol.signature = format!("namespace {}", name);
                symbols.push(symbol);
                if caps.get(2).is_some() {
                    tracker.file_namespace = Some(name);
                } else {
                    tracker.pending = Some((name, None));
                }
            } else if let Some(caps) = TYPE_RE.captures(decl) {
                let name = caps[3].to_string();
                let kind = SymbolKind::from_keyword(&caps[2]).unwrap_or(SymbolKind::Class);
                let access = access_of(&caps[1], "internal");
                let qualified = tracker.qualify(&name);
                let symbol = self.build_symbol(&lines, idx, decl, inline_attributes, qualified.clone(), kind, access);
                symbols.push(symbol);

                // `class C { void M() { } }` on a single line
                if let Some(body) = decl.split_once('{').map(|(_, body)| body.trim()) {
                    if let Some(member) = match_member(body, &name, kind) {
                        let mut symbol = Symbol::new(format!("{}.{}", qualified, member.name), member.kind, line_no(idx));
                        let head = body.split_once(';').map_or(body, |(head, _)| head);
                        symbol.signature = signature_from(head, &[]);
                        symbol.exported = member.is_public();
                        symbol.access = member.access;
                        symbols.push(symbol);
                    }
                }
                let body_less = decl.ends_with(';') && !decl.contains('{');
                if !body_less {
                    tracker.pending = Some((name, Some(kind)));
                }
            } else if let Some(scope) = tracker.enclosing_type().filter(|_| tracker.in_type_body()) {
                if let Some(member) = match_member(decl, &scope.name, scope.kind.unwrap_or(SymbolKind::Class)) {
                    let qualified = tracker.qualify(&member.name);
                    let symbol =
                        self.build_symbol(&lines, idx, decl, inline_attributes, qualified, member.kind, member.access);
                    symbols.push(symbol);
                }
            }

            tracker.consume(raw);
        }

        Ok(ExtractionResult { symbols, imports: Vec::new() })
    }
}

#[derive(Debug)]
struct Member {
    name: String,
    kind: SymbolKind,
    access: String,
}

impl Member {
    fn is_public(&self) -> bool {
        self.access.split_whitespace().any(|w| w == "public")
    }
}

/// Recognize a method or constructor declaration inside the body of
/// `enclosing`. Interface members without a modifier are public.
fn match_member(text: &str, enclosing: &str, enclosing_kind: SymbolKind) -> Option<Member> {
    let caps = MEMBER_RE.captures(text)?;
    let name = caps[3].to_string();
    let return_type = caps.get(2).map(|m| m.as_str().trim());
    let is_statement = STATEMENT_WORDS.contains(&name.as_str())
        || return_type.is_some_and(|rt| rt.split_whitespace().any(|w| STATEMENT_WORDS.contains(&w)));
    if is_statement {
        return None;
    }

    let kind = match return_type {
        Some(rt) if last_token(rt) == name => SymbolKind::Constructor,
        None if enclosing == name => SymbolKind::Constructor,
        _ => SymbolKind::Method,
    };
    let default_access = if enclosing_kind == SymbolKind::Interface { "public" } else { "private" };
    Some(Member { name, kind, access: access_of(&caps[1], default_access) })
}

impl CSharpExtractor {
    #[allow(clippy::too_many_arguments)]
    fn build_symbol(
        &self,
        lines: &[&str],
        idx: usize,
        decl: &str,
        inline_attributes: &str,
        name: String,
        kind: SymbolKind,
        access: String,
    ) -> Symbol {
        let (above, attr_start) = attributes_above(lines, idx);
        let attributes = [above.as_str(), inline_attributes]
            .into_iter()
            .filter(|a| !a.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let doc = doc_above(lines, attr_start);
        let tags = self
            .critical_tags
            .iter()
            .filter(|tag| doc.contains(tag.as_str()) || attributes.contains(tag.as_str()))
            .cloned()
            .collect();

        let mut symbol = Symbol::new(name, kind, line_no(idx));
        symbol.signature = signature_from(decl, &lines[idx + 1..]);
        symbol.exported = access.split_whitespace().any(|w| w == "public");
        symbol.access = access;
        symbol.doc = doc;
        symbol.attributes = attributes;
        symbol.tags = tags;
        symbol
    }
}

fn line_no(idx: usize) -> u32 {
    u32::try_from(idx + 1).unwrap_or(u32::MAX)
}

fn last_token(return_type: &str) -> &str {
    return_type.split_whitespace().last().unwrap_or(return_type)
}

fn access_of(modifiers: &str, default: &str) -> String {
    let words: Vec<&str> = modifiers
        .split_whitespace()
        .filter(|w| ACCESS_WORDS.contains(w))
        .collect();
    if words.is_empty() {
        default.to_string()
    } else {
        words.join(" ")
    }
}

/// Join `first` and the lines after it until one opens a body (`{`) or
/// expression body (`=>`).
fn signature_from(first: &str, rest: &[&str]) -> String {
    let mut parts = Vec::new();
    for line in std::iter::once(&first).chain(rest).take(MAX_SIGNATURE_LINES) {
        let trimmed = line.trim();
        let cut = [trimmed.find('{'), trimmed.find("=>")]
            .into_iter()
            .flatten()
            .min();
        match cut {
            Some(pos) => {
                parts.push(trimmed[..pos].trim());
                break;
            }
            None => {
                parts.push(trimmed);
                if trimmed.ends_with(';') {
                    break;
                }
            }
        }
    }
    parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(';')
        .trim()
        .to_string()
}

/// Split `[A] [B(1)] public void M()` into its attribute prefix and the rest.
fn split_leading_attributes(line: &str) -> (&str, &str) {
    let mut end = 0;
    loop {
        let rest = &line[end..];
        let offset = rest.len() - rest.trim_start().len();
        if !rest.trim_start().starts_with('[') {
            break;
        }
        let mut depth = 0usize;
        let mut close = None;
        for (pos, c) in rest.char_indices().skip(offset) {
            match c {
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(pos);
                        break;
                    }
                }
                _ => {}
            }
        }
        match close {
            Some(pos) => end += pos + 1,
            None => return (line, ""),
        }
    }
    (line[..end].trim(), line[end..].trim())
}

/// Up to three contiguous `[...]` lines directly above `idx`.
///
/// Returns the attribute text and the index of the topmost attribute line.
fn attributes_above(lines: &[&str], idx: usize) -> (String, usize) {
    let mut start = idx;
    while start > 0 && idx - start < MAX_ATTRIBUTE_LINES {
        let above = lines[start - 1].trim();
        if above.starts_with('[') && above.ends_with(']') {
            start -= 1;
        } else {
            break;
        }
    }
    let attributes = lines[start..idx]
        .iter()
        .map(|l| l.trim())
        .collect::<Vec<_>>()
        .join(" ");
    (attributes, start)
}

/// `///` lines directly above `idx`, with XML tags removed.
fn doc_above(lines: &[&str], idx: usize) -> String {
    let mut start = idx;
    while start > 0 && lines[start - 1].trim().starts_with("///") {
        start -= 1;
    }
    lines[start..idx]
        .iter()
        .map(|l| l.trim().trim_start_matches('/').trim())
        .map(|l| XML_TAG_RE.replace_all(l, "").trim().to_string())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
