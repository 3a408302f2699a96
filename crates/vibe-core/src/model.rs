//! Core data structures for the repository index

use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::VibeError;

/// Languages the indexer knows how to look inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    CSharp,
    Python,
    JavaScript,
    TypeScript,
    C,
    Cpp,
    /// `*.csproj`, `*.fsproj`, `*.vbproj`
    ProjectFile,
    /// `*.sln`
    Solution,
    Other,
}

impl Language {
    /// Detect language from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("cs") => Language::CSharp,
            Some("py") | Some("pyi") => Language::Python,
            Some("js") | Some("jsx") | Some("mjs") | Some("cjs") => Language::JavaScript,
            Some("ts") | Some("tsx") | Some("mts") | Some("cts") => Language::TypeScript,
            Some("c") => Language::C,
            Some("h") | Some("hh") | Some("hpp") | Some("hxx") | Some("cpp") | Some("cc")
            | Some("cxx") | Some("inl") => Language::Cpp,
            Some("csproj") | Some("fsproj") | Some("vbproj") => Language::ProjectFile,
            Some("sln") => Language::Solution,
            _ => Language::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::CSharp => "csharp",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::ProjectFile => "project",
            Language::Solution => "solution",
            Language::Other => "other",
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "csharp" => Language::CSharp,
            "python" => Language::Python,
            "javascript" => Language::JavaScript,
            "typescript" => Language::TypeScript,
            "c" => Language::C,
            "cpp" => Language::Cpp,
            "project" => Language::ProjectFile,
            "solution" => Language::Solution,
            _ => Language::Other,
        }
    }

    /// Languages whose import syntax goes through the JS resolver.
    pub fn is_script(&self) -> bool {
        matches!(self, Language::JavaScript | Language::TypeScript)
    }

    /// Languages resolved by `#include` search.
    pub fn is_native(&self) -> bool {
        matches!(self, Language::C | Language::Cpp)
    }
}

/// A tracked file, keyed by its repo-relative forward-slash path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    /// Last-seen modification time, milliseconds since the Unix epoch.
    pub mtime_ms: i64,
    /// SHA-256 hex digest of the file bytes.
    pub hash: String,
    pub size: u64,
    pub line_count: u32,
    pub language: Language,
}

/// What kind of declaration a symbol is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Namespace,
    Class,
    Struct,
    Interface,
    Enum,
    Record,
    Method,
    Constructor,
    Function,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Namespace => "namespace",
            SymbolKind::Class => "class",
            SymbolKind::Struct => "struct",
            SymbolKind::Interface => "interface",
            SymbolKind::Enum => "enum",
            SymbolKind::Record => "record",
            SymbolKind::Method => "method",
            SymbolKind::Constructor => "constructor",
            SymbolKind::Function => "function",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "namespace" => Some(SymbolKind::Namespace),
            "class" => Some(SymbolKind::Class),
            "struct" => Some(SymbolKind::Struct),
            "interface" => Some(SymbolKind::Interface),
            "enum" => Some(SymbolKind::Enum),
            "record" => Some(SymbolKind::Record),
            "method" => Some(SymbolKind::Method),
            "constructor" => Some(SymbolKind::Constructor),
            "function" => Some(SymbolKind::Function),
            _ => None,
        }
    }

    /// Kinds that open a scope other symbols are qualified by.
    pub fn is_type(&self) -> bool {
        matches!(
            self,
            SymbolKind::Class
                | SymbolKind::Struct
                | SymbolKind::Interface
                | SymbolKind::Enum
                | SymbolKind::Record
        )
    }
}

/// A declaration found inside a [`SourceFile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    /// Namespace-qualified where the language has namespaces.
    pub name: String,
    pub line: u32,
    pub kind: SymbolKind,
    pub signature: String,
    pub access: String,
    pub doc: String,
    pub attributes: String,
    /// Critical markers found in doc or attribute text.
    pub tags: Vec<String>,
    pub exported: bool,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, line: u32) -> Self {
        Symbol {
            name: name.into(),
            line,
            kind,
            signature: String::new(),
            access: String::new(),
            doc: String::new(),
            attributes: String::new(),
            tags: Vec::new(),
            exported: false,
        }
    }
}

/// Typed relationship between two files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// `import a.b`
    PyImport,
    /// `from a import b`
    PyFrom,
    /// ES import, re-export, `require` or dynamic `import()`
    JsImport,
    /// `#include`
    CppInclude,
    /// `<ProjectReference>` between project files
    ProjectRef,
    /// Solution entry pointing at a project file
    SlnProject,
}

impl EdgeKind {
    pub const COARSE: [EdgeKind; 2] = [EdgeKind::ProjectRef, EdgeKind::SlnProject];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::PyImport => "py_import",
            EdgeKind::PyFrom => "py_from",
            EdgeKind::JsImport => "js_import",
            EdgeKind::CppInclude => "cpp_include",
            EdgeKind::ProjectRef => "project_ref",
            EdgeKind::SlnProject => "sln_project",
        }
    }

    /// Coarse edges come from project/solution files and are rebuilt wholesale.
    pub fn is_coarse(&self) -> bool {
        matches!(self, EdgeKind::ProjectRef | EdgeKind::SlnProject)
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeKind {
    type Err = VibeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "py_import" => Ok(EdgeKind::PyImport),
            "py_from" => Ok(EdgeKind::PyFrom),
            "js_import" => Ok(EdgeKind::JsImport),
            "cpp_include" => Ok(EdgeKind::CppInclude),
            "project_ref" => Ok(EdgeKind::ProjectRef),
            "sln_project" => Ok(EdgeKind::SlnProject),
            other => Err(VibeError::UnknownEdgeKind(other.to_string())),
        }
    }
}

/// A directed, verified dependency from one indexed file to another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    pub line: Option<u32>,
    /// The raw import/include text the edge was resolved from.
    pub detail: Option<String>,
}

impl DependencyEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, kind: EdgeKind) -> Self {
        DependencyEdge {
            from: from.into(),
            to: to.into(),
            kind,
            line: None,
            detail: None,
        }
    }

    pub fn is_self_edge(&self) -> bool {
        self.from == self.to
    }
}

/// SHA-256 hex digest of file content.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Number of lines, counting a trailing unterminated line.
pub fn line_count(bytes: &[u8]) -> u32 {
    if bytes.is_empty() {
        return 0;
    }
    let newlines = bytes.iter().filter(|b| **b == b'\n').count();
    let trailing = usize::from(!bytes.ends_with(b"\n"));
    u32::try_from(newlines + trailing).unwrap_or(u32::MAX)
}

/// Render a relative path with forward slashes, folding `.` and `..` lexically.
///
/// Returns `None` when `..` would climb above the start of the path.
pub fn normalize_rel_path(path: &Path) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(parts.join("/"))
}

/// Join a repo-relative directory with a relative reference, staying inside the repo.
pub fn join_rel(dir: &str, rel: &str) -> Option<String> {
    let rel = rel.replace('\\', "/");
    if rel.starts_with('/') {
        return None;
    }
    let joined = if dir.is_empty() {
        rel
    } else {
        format!("{}/{}", dir, rel)
    };
    normalize_rel_path(Path::new(&joined))
}

/// Directory part of a repo-relative path (`""` for top-level files).
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_detection() {
        assert_eq!(Language::from_path(Path::new("src/app/Program.cs")), Language::CSharp);
        assert_eq!(Language::from_path(Path::new("pkg/mod.py")), Language::Python);
        assert_eq!(Language::from_path(Path::new("web/index.tsx")), Language::TypeScript);
        assert_eq!(Language::from_path(Path::new("include/api.h")), Language::Cpp);
        assert_eq!(Language::from_path(Path::new("App/App.csproj")), Language::ProjectFile);
        assert_eq!(Language::from_path(Path::new("README.md")), Language::Other);
        assert_eq!(Language::from_name(Language::Solution.as_str()), Language::Solution);
    }

    #[test]
    fn test_edge_kind_round_trip_names() {
        for kind in [EdgeKind::PyImport, EdgeKind::CppInclude, EdgeKind::SlnProject] {
            assert_eq!(kind.as_str().parse::<EdgeKind>().unwrap(), kind);
        }
        assert!("bogus".parse::<EdgeKind>().is_err());
        assert!(EdgeKind::ProjectRef.is_coarse());
        assert!(!EdgeKind::JsImport.is_coarse());
    }

    #[test]
    fn test_content_hash_is_stable() {
        let a = content_hash(b"class A {}");
        assert_eq!(a, content_hash(b"class A {}"));
        assert_ne!(a, content_hash(b"class B {}"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_line_count() {
        assert_eq!(line_count(b""), 0);
        assert_eq!(line_count(b"one"), 1);
        assert_eq!(line_count(b"one\n"), 1);
        assert_eq!(line_count(b"one\ntwo"), 2);
    }

    #[test]
    fn test_path_normalization() {
        assert_eq!(join_rel("src/a", "../b/c.h").as_deref(), Some("src/b/c.h"));
        assert_eq!(join_rel("", "./x.py").as_deref(), Some("x.py"));
        assert_eq!(join_rel("src", "../../escape.h"), None);
        assert_eq!(join_rel("App", "..\\Lib\\Lib.csproj").as_deref(), Some("Lib/Lib.csproj"));
        assert_eq!(parent_dir("a/b/c.py"), "a/b");
        assert_eq!(parent_dir("c.py"), "");
    }
}
