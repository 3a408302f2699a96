//! SQLite-backed index of files, symbols, content and dependency edges.
//!
//! One `Store` handle is the single writer for a process invocation. All
//! mutations for one file run inside one transaction, so readers on other
//! connections (WAL mode) never observe a half-replaced symbol set.
//!
//! # Tables
//!
//! | Table         | Contents                                            |
//! |---------------|-----------------------------------------------------|
//! | `files`       | one row per tracked path with mtime/size/hash       |
//! | `symbols`     | declarations, replaced per file as a set            |
//! | `edges`       | typed dependency edges (code-level and coarse)      |
//! | `symbols_fts` | FTS5 over symbol name/signature/doc/tags            |
//! | `content_fts` | FTS5 over raw file text                             |

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Transaction, params, params_from_iter};
use serde::{Deserialize, Serialize};

use crate::model::{DependencyEdge, EdgeKind, Language, SourceFile, Symbol, SymbolKind};
use crate::paths;

const SCHEMA_VERSION: i64 = 1;

/// Upper bound on paths bound into one `IN (...)` list. Edge purges bind the
/// batch twice, which keeps them under SQLite's 999-parameter default.
pub const PURGE_BATCH: usize = 400;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    path TEXT PRIMARY KEY,
    mtime_ms INTEGER NOT NULL,
    size INTEGER NOT NULL,
    hash TEXT NOT NULL,
    line_count INTEGER NOT NULL,
    language TEXT NOT NULL,
    indexed_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS symbols (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL,
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    line INTEGER NOT NULL,
    signature TEXT NOT NULL,
    access TEXT NOT NULL,
    doc TEXT NOT NULL,
    attributes TEXT NOT NULL,
    tags TEXT NOT NULL,
    exported INTEGER NOT NULL CHECK (exported IN (0, 1))
);
CREATE INDEX IF NOT EXISTS idx_symbols_path ON symbols(path);
CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name);

CREATE TABLE IF NOT EXISTS edges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    src TEXT NOT NULL,
    dst TEXT NOT NULL,
    kind TEXT NOT NULL,
    line INTEGER,
    detail TEXT
);
CREATE INDEX IF NOT EXISTS idx_edges_src ON edges(src);
CREATE INDEX IF NOT EXISTS idx_edges_dst ON edges(dst);
CREATE INDEX IF NOT EXISTS idx_edges_kind ON edges(kind);

CREATE VIRTUAL TABLE IF NOT EXISTS symbols_fts USING fts5(
    path UNINDEXED,
    name,
    signature,
    doc,
    tags,
    line UNINDEXED,
    tokenize = 'unicode61'
);

CREATE VIRTUAL TABLE IF NOT EXISTS content_fts USING fts5(
    path UNINDEXED,
    content,
    tokenize = 'unicode61'
);
"#;

/// Change-detection columns for one stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub mtime_ms: i64,
    pub size: u64,
    pub hash: String,
}

/// Everything written for one file in a single transaction.
#[derive(Debug, Clone)]
pub struct FileUpdate {
    pub file: SourceFile,
    pub symbols: Vec<Symbol>,
    /// Code-level edges originating from this file.
    pub edges: Vec<DependencyEdge>,
    /// Text for the content index; `None` leaves the file out of it.
    pub content: Option<String>,
}

/// A full-text search match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub path: String,
    /// Set for symbol matches, `None` for file-content matches.
    pub symbol: Option<String>,
    pub line: Option<u32>,
    /// BM25 score, lower is better.
    pub rank: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreCounts {
    pub files: usize,
    pub symbols: usize,
    pub edges: usize,
}

/// Size figures for one indexed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStats {
    pub path: String,
    pub line_count: u32,
    pub symbols: usize,
    /// Whether any symbol in the file carries a critical tag.
    pub critical: bool,
}

/// Handle on the index database.
pub struct Store {
    conn: Connection,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("path", &self.conn.path()).finish()
    }
}

impl Store {
    /// Open (creating if needed) the database at `db_path`.
    pub fn open(db_path: &Path) -> Result<Self> {
        paths::ensure_parent(db_path)
            .with_context(|| format!("create db directory for {}", db_path.display()))?;
        let conn = Connection::open(db_path)
            .with_context(|| format!("open sqlite db at {}", db_path.display()))?;
        conn.busy_timeout(Duration::from_secs(30))?;
        let _journal_mode: String =
            conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::init(conn)
    }

    /// Open the index at its default location under `<root>/.vibe/`.
    pub fn open_for_repo(root: &Path) -> Result<Self> {
        Self::open(&paths::index_db_path(root))
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version > SCHEMA_VERSION {
            anyhow::bail!(
                "index schema v{} is newer than supported v{}",
                version,
                SCHEMA_VERSION
            );
        }
        conn.execute_batch(SCHEMA_SQL).context("apply index schema")?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(Store { conn })
    }

    // ── Writes ─────────────────────────────────────────────

    /// Insert or update one file row.
    pub fn upsert_file(&mut self, file: &SourceFile) -> Result<()> {
        let tx = self.conn.transaction()?;
        upsert_file_tx(&tx, file)?;
        tx.commit()?;
        Ok(())
    }

    /// Replace the symbol set of `path` as a whole.
    pub fn replace_symbols(&mut self, path: &str, symbols: &[Symbol]) -> Result<()> {
        let tx = self.conn.transaction()?;
        replace_symbols_tx(&tx, path, symbols)?;
        tx.commit()?;
        Ok(())
    }

    /// Replace the code-level edges originating at `path`.
    pub fn replace_edges(&mut self, path: &str, edges: &[DependencyEdge]) -> Result<()> {
        let tx = self.conn.transaction()?;
        replace_edges_tx(&tx, path, edges)?;
        tx.commit()?;
        Ok(())
    }

    /// Write a file's row, symbols, edges and content in one transaction.
    pub fn apply_file_update(&mut self, update: &FileUpdate) -> Result<()> {
        let path = update.file.path.as_str();
        let tx = self.conn.transaction()?;
        upsert_file_tx(&tx, &update.file)?;
        replace_symbols_tx(&tx, path, &update.symbols)?;
        replace_edges_tx(&tx, path, &update.edges)?;
        tx.execute("DELETE FROM content_fts WHERE path = ?1", params![path])?;
        if let Some(content) = &update.content {
            tx.execute(
                "INSERT INTO content_fts (path, content) VALUES (?1, ?2)",
                params![path, content],
            )?;
        }
        tx.commit()
            .with_context(|| format!("commit index update for {}", path))?;
        Ok(())
    }

    /// Update housekeeping columns only; symbols and edges stay as they are.
    pub fn touch_file(&mut self, path: &str, mtime_ms: i64, size: u64, line_count: u32) -> Result<()> {
        self.conn.execute(
            "UPDATE files SET mtime_ms = ?2, size = ?3, line_count = ?4 WHERE path = ?1",
            params![path, mtime_ms, to_i64(size), line_count],
        )?;
        Ok(())
    }

    /// Replace every coarse (project/solution) edge in one pass.
    pub fn replace_coarse_edges(&mut self, edges: &[DependencyEdge]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM edges WHERE kind IN (?1, ?2)",
            params![EdgeKind::COARSE[0].as_str(), EdgeKind::COARSE[1].as_str()],
        )?;
        insert_edges_tx(&tx, edges.iter().filter(|e| e.kind.is_coarse()))?;
        tx.commit()?;
        Ok(())
    }

    /// Delete every row belonging to a tracked path not in `present`.
    ///
    /// Returns the purged paths, sorted.
    pub fn purge_missing(&mut self, present: &HashSet<String>) -> Result<Vec<String>> {
        let mut stale: Vec<String> = self
            .all_paths()?
            .into_iter()
            .filter(|p| !present.contains(p))
            .collect();
        stale.sort();
        self.remove_paths(&stale)?;
        Ok(stale)
    }

    /// Delete rows for specific paths, batched.
    pub fn remove_paths(&mut self, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let tx = self.conn.transaction()?;
        for batch in paths.chunks(PURGE_BATCH) {
            let placeholders = vec!["?"; batch.len()].join(", ");
            for table in ["files", "symbols", "symbols_fts", "content_fts"] {
                let sql = format!("DELETE FROM {} WHERE path IN ({})", table, placeholders);
                tx.execute(&sql, params_from_iter(batch.iter()))?;
            }
            let sql = format!(
                "DELETE FROM edges WHERE src IN ({0}) OR dst IN ({0})",
                placeholders
            );
            tx.execute(&sql, params_from_iter(batch.iter().chain(batch.iter())))?;
        }
        tx.commit()?;
        tracing::debug!("Purged {} stale paths", paths.len());
        Ok(())
    }

    // ── Reads ──────────────────────────────────────────────

    pub fn file(&self, path: &str) -> Result<Option<SourceFile>> {
        self.conn
            .query_row(
                "SELECT path, mtime_ms, hash, size, line_count, language FROM files WHERE path = ?1",
                params![path],
                row_to_file,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Most recently modified files first.
    pub fn files_by_mtime(&self, limit: usize) -> Result<Vec<SourceFile>> {
        let mut stmt = self.conn.prepare(
            "SELECT path, mtime_ms, hash, size, line_count, language FROM files
             ORDER BY mtime_ms DESC, path ASC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![to_i64(limit as u64)], row_to_file)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn all_paths(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT path FROM files ORDER BY path")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<Vec<String>>>().map_err(Into::into)
    }

    /// Change-detection columns for every tracked file.
    pub fn all_file_meta(&self) -> Result<HashMap<String, FileMeta>> {
        let mut stmt = self.conn.prepare("SELECT path, mtime_ms, size, hash FROM files")?;
        let rows = stmt.query_map([], |row| {
            let size: i64 = row.get(2)?;
            Ok((
                row.get::<_, String>(0)?,
                FileMeta {
                    mtime_ms: row.get(1)?,
                    size: u64::try_from(size).unwrap_or(0),
                    hash: row.get(3)?,
                },
            ))
        })?;
        let mut out = HashMap::new();
        for row in rows {
            let (path, meta) = row?;
            out.insert(path, meta);
        }
        Ok(out)
    }

    pub fn symbols_for_file(&self, path: &str) -> Result<Vec<Symbol>> {
        self.query_symbols("WHERE path = ?1 ORDER BY line, id", path)
            .map(|rows| rows.into_iter().map(|(_, s)| s).collect())
    }

    /// Symbols whose name equals `name` or ends with `.name`.
    pub fn symbols_by_name(&self, name: &str) -> Result<Vec<(String, Symbol)>> {
        let mut rows = self.query_symbols("WHERE name = ?1 ORDER BY path, line", name)?;
        // exact, case-sensitive suffix match; LIKE would fold case and expand `_`
        rows.extend(self.query_symbols(
            "WHERE length(name) > length(?1) AND substr(name, -length(?1) - 1) = '.' || ?1
             ORDER BY path, line",
            name,
        )?);
        Ok(rows)
    }

    fn query_symbols(&self, clause: &str, arg: &str) -> Result<Vec<(String, Symbol)>> {
        let sql = format!(
            "SELECT path, name, kind, line, signature, access, doc, attributes, tags, exported
             FROM symbols {}",
            clause
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![arg], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, bool>(9)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (path, name, kind, line, signature, access, doc, attributes, tags, exported) = row?;
            let Some(kind) = SymbolKind::from_keyword(&kind) else {
                tracing::warn!("Skipping symbol {} with unknown kind {}", name, kind);
                continue;
            };
            out.push((
                path,
                Symbol {
                    name,
                    line,
                    kind,
                    signature,
                    access,
                    doc,
                    attributes,
                    tags: serde_json::from_str(&tags).unwrap_or_default(),
                    exported,
                },
            ));
        }
        Ok(out)
    }

    pub fn edges_from(&self, path: &str) -> Result<Vec<DependencyEdge>> {
        self.query_edges("WHERE src = ?1 ORDER BY id", Some(path))
    }

    pub fn edges_to(&self, path: &str) -> Result<Vec<DependencyEdge>> {
        self.query_edges("WHERE dst = ?1 ORDER BY id", Some(path))
    }

    /// All stored edges, coarse first, each group in insertion order.
    pub fn all_edges(&self) -> Result<Vec<DependencyEdge>> {
        let mut edges = self.coarse_edges()?;
        edges.extend(self.code_edges()?);
        Ok(edges)
    }

    /// Stored edges whose kind is in `kinds`; an empty filter returns all.
    pub fn edges(&self, kinds: &[EdgeKind]) -> Result<Vec<DependencyEdge>> {
        let mut edges = self.all_edges()?;
        if !kinds.is_empty() {
            edges.retain(|e| kinds.contains(&e.kind));
        }
        Ok(edges)
    }

    pub fn coarse_edges(&self) -> Result<Vec<DependencyEdge>> {
        self.query_edges("WHERE kind IN ('project_ref', 'sln_project') ORDER BY id", None)
    }

    pub fn code_edges(&self) -> Result<Vec<DependencyEdge>> {
        self.query_edges("WHERE kind NOT IN ('project_ref', 'sln_project') ORDER BY id", None)
    }

    fn query_edges(&self, clause: &str, arg: Option<&str>) -> Result<Vec<DependencyEdge>> {
        let sql = format!("SELECT src, dst, kind, line, detail FROM edges {}", clause);
        let mut stmt = self.conn.prepare(&sql)?;
        let map_row = |row: &rusqlite::Row<'_>| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<u32>>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        };
        let rows = match arg {
            Some(arg) => stmt.query_map(params![arg], map_row)?.collect::<rusqlite::Result<Vec<_>>>()?,
            None => stmt.query_map([], map_row)?.collect::<rusqlite::Result<Vec<_>>>()?,
        };

        let mut edges = Vec::with_capacity(rows.len());
        for (from, to, kind, line, detail) in rows {
            match kind.parse::<EdgeKind>() {
                Ok(kind) => edges.push(DependencyEdge { from, to, kind, line, detail }),
                Err(e) => tracing::warn!("Skipping edge {} -> {}: {}", from, to, e),
            }
        }
        Ok(edges)
    }

    /// Full-text search over symbol metadata, then file content.
    ///
    /// Each whitespace-separated term is quoted, so punctuation in the query
    /// is matched literally rather than parsed as FTS5 syntax.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let fts_query = quote_fts_terms(query);
        if fts_query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let limit_param = to_i64(limit as u64);

        let mut hits = Vec::new();
        {
            let mut stmt = self.conn.prepare(
                "SELECT path, name, line, bm25(symbols_fts, 0.0, 4.0, 2.0, 1.0, 1.0, 0.0) AS rank
                 FROM symbols_fts WHERE symbols_fts MATCH ?1
                 ORDER BY rank, path LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![fts_query, limit_param], |row| {
                    Ok(SearchHit {
                        path: row.get(0)?,
                        symbol: Some(row.get(1)?),
                        line: row.get::<_, Option<u32>>(2)?,
                        rank: row.get(3)?,
                    })
                })
                .with_context(|| format!("search symbols for '{}'", query))?;
            for row in rows {
                hits.push(row?);
            }
        }

        if hits.len() < limit {
            let remaining = to_i64((limit - hits.len()) as u64);
            let mut stmt = self.conn.prepare(
                "SELECT path, bm25(content_fts) AS rank FROM content_fts
                 WHERE content_fts MATCH ?1 ORDER BY rank, path LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![fts_query, remaining], |row| {
                    Ok(SearchHit {
                        path: row.get(0)?,
                        symbol: None,
                        line: None,
                        rank: row.get(1)?,
                    })
                })
                .with_context(|| format!("search content for '{}'", query))?;
            for row in rows {
                hits.push(row?);
            }
        }
        Ok(hits)
    }

    /// Line and symbol counts for every indexed file, in path order.
    pub fn file_stats(&self) -> Result<Vec<FileStats>> {
        let mut stmt = self.conn.prepare(
            "SELECT f.path, f.line_count, COUNT(s.id), COALESCE(MAX(s.tags <> '[]'), 0)
             FROM files f LEFT JOIN symbols s ON s.path = f.path
             GROUP BY f.path
             ORDER BY f.path",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(FileStats {
                path: row.get(0)?,
                line_count: row.get(1)?,
                symbols: usize::try_from(row.get::<_, i64>(2)?).unwrap_or(0),
                critical: row.get::<_, i64>(3)? != 0,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn counts(&self) -> Result<StoreCounts> {
        let count = |table: &str| -> Result<usize> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
            Ok(usize::try_from(n).unwrap_or(0))
        };
        Ok(StoreCounts {
            files: count("files")?,
            symbols: count("symbols")?,
            edges: count("edges")?,
        })
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn row_to_file(row: &rusqlite::Row<'_>) -> rusqlite::Result<SourceFile> {
    let size: i64 = row.get(3)?;
    let language: String = row.get(5)?;
    Ok(SourceFile {
        path: row.get(0)?,
        mtime_ms: row.get(1)?,
        hash: row.get(2)?,
        size: u64::try_from(size).unwrap_or(0),
        line_count: row.get(4)?,
        language: Language::from_name(&language),
    })
}

fn quote_fts_terms(query: &str) -> String {
    query
        .split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

fn upsert_file_tx(tx: &Transaction<'_>, file: &SourceFile) -> Result<()> {
    tx.execute(
        "INSERT INTO files (path, mtime_ms, size, hash, line_count, language, indexed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(path) DO UPDATE SET
            mtime_ms = excluded.mtime_ms,
            size = excluded.size,
            hash = excluded.hash,
            line_count = excluded.line_count,
            language = excluded.language,
            indexed_at = excluded.indexed_at",
        params![
            file.path,
            file.mtime_ms,
            to_i64(file.size),
            file.hash,
            file.line_count,
            file.language.as_str(),
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn replace_symbols_tx(tx: &Transaction<'_>, path: &str, symbols: &[Symbol]) -> Result<()> {
    tx.execute("DELETE FROM symbols WHERE path = ?1", params![path])?;
    tx.execute("DELETE FROM symbols_fts WHERE path = ?1", params![path])?;

    let mut insert = tx.prepare_cached(
        "INSERT INTO symbols (path, name, kind, line, signature, access, doc, attributes, tags, exported)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?;
    let mut insert_fts = tx.prepare_cached(
        "INSERT INTO symbols_fts (path, name, signature, doc, tags, line) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for symbol in symbols {
        insert.execute(params![
            path,
            symbol.name,
            symbol.kind.as_str(),
            symbol.line,
            symbol.signature,
            symbol.access,
            symbol.doc,
            symbol.attributes,
            serde_json::to_string(&symbol.tags)?,
            symbol.exported,
        ])?;
        insert_fts.execute(params![
            path,
            symbol.name,
            symbol.signature,
            symbol.doc,
            symbol.tags.join(" "),
            symbol.line,
        ])?;
    }
    Ok(())
}

fn replace_edges_tx(tx: &Transaction<'_>, path: &str, edges: &[DependencyEdge]) -> Result<()> {
    tx.execute(
        "DELETE FROM edges WHERE src = ?1 AND kind NOT IN ('project_ref', 'sln_project')",
        params![path],
    )?;
    insert_edges_tx(tx, edges.iter().filter(|e| e.from == path && !e.kind.is_coarse()))
}

fn insert_edges_tx<'a>(
    tx: &Transaction<'_>,
    edges: impl Iterator<Item = &'a DependencyEdge>,
) -> Result<()> {
    let mut stmt = tx.prepare_cached(
        "INSERT INTO edges (src, dst, kind, line, detail) VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for edge in edges {
        stmt.execute(params![
            edge.from,
            edge.to,
            edge.kind.as_str(),
            edge.line,
            edge.detail
        ])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::content_hash;

    fn file(path: &str, body: &str) -> SourceFile {
        SourceFile {
            path: path.to_string(),
            mtime_ms: 1_000,
            hash: content_hash(body.as_bytes()),
            size: body.len() as u64,
            line_count: 1,
            language: Language::from_path(Path::new(path)),
        }
    }

    fn update(path: &str, body: &str, symbols: Vec<Symbol>, edges: Vec<DependencyEdge>) -> FileUpdate {
        FileUpdate {
            file: file(path, body),
            symbols,
            edges,
            content: Some(body.to_string()),
        }
    }

    #[test]
    fn test_apply_and_read_back() {
        let mut store = Store::open_in_memory().unwrap();
        let mut symbol = Symbol::new("Shop.Cart.Checkout", SymbolKind::Method, 12);
        symbol.tags = vec!["@critical".to_string()];
        symbol.exported = true;
        let edge = DependencyEdge::new("a.py", "b.py", EdgeKind::PyImport);
        store
            .apply_file_update(&update("a.py", "import b", vec![symbol.clone()], vec![edge.clone()]))
            .unwrap();

        assert_eq!(store.file("a.py").unwrap().unwrap().hash, content_hash(b"import b"));
        assert_eq!(store.symbols_for_file("a.py").unwrap(), vec![symbol]);
        assert_eq!(store.edges_from("a.py").unwrap(), vec![edge.clone()]);
        assert_eq!(store.edges_to("b.py").unwrap(), vec![edge]);
        assert_eq!(store.symbols_by_name("Checkout").unwrap().len(), 1);
    }

    #[test]
    fn test_symbols_by_name_matches_exactly() {
        let mut store = Store::open_in_memory().unwrap();
        let symbols = vec![
            Symbol::new("Repo.Get_Id", SymbolKind::Method, 1),
            Symbol::new("Repo.GetXId", SymbolKind::Method, 2),
            Symbol::new("Repo.get_id", SymbolKind::Method, 3),
            Symbol::new("Get_Id", SymbolKind::Function, 4),
            Symbol::new("RepoGet_Id", SymbolKind::Function, 5),
        ];
        store.apply_file_update(&update("repo.py", "", symbols, vec![])).unwrap();

        let found: Vec<String> = store
            .symbols_by_name("Get_Id")
            .unwrap()
            .into_iter()
            .map(|(_, s)| s.name)
            .collect();
        assert_eq!(found, vec!["Get_Id", "Repo.Get_Id"]);
        assert!(store.symbols_by_name("%Id").unwrap().is_empty());
    }

    #[test]
    fn test_file_stats() {
        let mut store = Store::open_in_memory().unwrap();
        let mut hot = Symbol::new("Pay", SymbolKind::Function, 1);
        hot.tags = vec!["@critical".to_string()];
        let symbols = vec![hot, Symbol::new("Refund", SymbolKind::Function, 5)];
        store.apply_file_update(&update("pay.py", "def Pay(): pass", symbols, vec![])).unwrap();
        store.apply_file_update(&update("empty.py", "", vec![], vec![])).unwrap();

        let stats = store.file_stats().unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!((stats[0].path.as_str(), stats[0].symbols, stats[0].critical), ("empty.py", 0, false));
        assert_eq!((stats[1].path.as_str(), stats[1].symbols, stats[1].critical), ("pay.py", 2, true));
        assert_eq!(stats[1].line_count, 1);
    }

    #[test]
    fn test_symbols_replaced_as_a_set() {
        let mut store = Store::open_in_memory().unwrap();
        let first = vec![
            Symbol::new("A", SymbolKind::Class, 1),
            Symbol::new("A.Run", SymbolKind::Method, 2),
        ];
        store.apply_file_update(&update("A.cs", "v1", first, vec![])).unwrap();
        let second = vec![Symbol::new("B", SymbolKind::Class, 1)];
        store.apply_file_update(&update("A.cs", "v2", second.clone(), vec![])).unwrap();

        assert_eq!(store.symbols_for_file("A.cs").unwrap(), second);
        assert_eq!(store.counts().unwrap().symbols, 1);
        assert!(store.search("Run", 10).unwrap().iter().all(|h| h.symbol.is_none()));
    }

    #[test]
    fn test_touch_keeps_symbols() {
        let mut store = Store::open_in_memory().unwrap();
        let symbols = vec![Symbol::new("f", SymbolKind::Function, 1)];
        store.apply_file_update(&update("f.js", "function f() {}", symbols.clone(), vec![])).unwrap();
        store.touch_file("f.js", 9_999, 15, 1).unwrap();

        let stored = store.file("f.js").unwrap().unwrap();
        assert_eq!(stored.mtime_ms, 9_999);
        assert_eq!(store.symbols_for_file("f.js").unwrap(), symbols);
    }

    #[test]
    fn test_purge_missing_removes_all_rows() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .apply_file_update(&update(
                "keep.py",
                "import gone",
                vec![Symbol::new("k", SymbolKind::Function, 1)],
                vec![DependencyEdge::new("keep.py", "gone.py", EdgeKind::PyImport)],
            ))
            .unwrap();
        store
            .apply_file_update(&update("gone.py", "def g(): pass", vec![Symbol::new("g", SymbolKind::Function, 1)], vec![]))
            .unwrap();

        let present: HashSet<String> = ["keep.py".to_string()].into_iter().collect();
        let purged = store.purge_missing(&present).unwrap();
        assert_eq!(purged, vec!["gone.py"]);
        assert!(store.file("gone.py").unwrap().is_none());
        assert!(store.edges_to("gone.py").unwrap().is_empty());
        assert_eq!(store.counts().unwrap(), StoreCounts { files: 1, symbols: 1, edges: 0 });
        assert!(store.search("g", 10).unwrap().iter().all(|h| h.path != "gone.py"));
    }

    #[test]
    fn test_purge_in_batches_beyond_parameter_limit() {
        let mut store = Store::open_in_memory().unwrap();
        for i in 0..(PURGE_BATCH * 2 + 7) {
            store.upsert_file(&file(&format!("f{}.py", i), "x")).unwrap();
        }
        let purged = store.purge_missing(&HashSet::new()).unwrap();
        assert_eq!(purged.len(), PURGE_BATCH * 2 + 7);
        assert_eq!(store.counts().unwrap().files, 0);
    }

    #[test]
    fn test_coarse_edges_replaced_wholesale() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .replace_coarse_edges(&[DependencyEdge::new("A/A.csproj", "B/B.csproj", EdgeKind::ProjectRef)])
            .unwrap();
        store
            .replace_edges("a.py", &[DependencyEdge::new("a.py", "b.py", EdgeKind::PyFrom)])
            .unwrap();
        store
            .replace_coarse_edges(&[DependencyEdge::new("B/B.csproj", "C/C.csproj", EdgeKind::ProjectRef)])
            .unwrap();

        let coarse = store.coarse_edges().unwrap();
        assert_eq!(coarse.len(), 1);
        assert_eq!(coarse[0].from, "B/B.csproj");
        assert_eq!(store.code_edges().unwrap().len(), 1);
        assert_eq!(store.all_edges().unwrap()[0].kind, EdgeKind::ProjectRef);
    }

    #[test]
    fn test_search_symbols_then_content() {
        let mut store = Store::open_in_memory().unwrap();
        let mut symbol = Symbol::new("Billing.Invoice", SymbolKind::Class, 3);
        symbol.doc = "Issues invoices to customers".to_string();
        store.apply_file_update(&update("Billing.cs", "class Invoice {}", vec![symbol], vec![])).unwrap();
        store
            .apply_file_update(&update("notes.md", "remember the invoice retry policy", vec![], vec![]))
            .unwrap();

        let hits = store.search("invoices", 10).unwrap();
        assert_eq!(hits[0].symbol.as_deref(), Some("Billing.Invoice"));
        assert_eq!(hits[0].line, Some(3));

        let hits = store.search("retry", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "notes.md");
        assert!(store.search("  ", 10).unwrap().is_empty());
        assert!(store.search("odd\"quote(", 10).is_ok());
    }

    #[test]
    fn test_files_by_mtime_order() {
        let mut store = Store::open_in_memory().unwrap();
        let mut old = file("old.py", "a");
        old.mtime_ms = 1;
        let mut new = file("new.py", "b");
        new.mtime_ms = 2;
        store.upsert_file(&old).unwrap();
        store.upsert_file(&new).unwrap();
        let files = store.files_by_mtime(10).unwrap();
        assert_eq!(files[0].path, "new.py");
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_open_on_disk() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        {
            let mut store = Store::open_for_repo(temp_dir.path()).unwrap();
            store.upsert_file(&file("x.py", "x")).unwrap();
        }
        let store = Store::open_for_repo(temp_dir.path()).unwrap();
        assert_eq!(store.all_paths().unwrap(), vec!["x.py"]);
    }
}
