//! Error taxonomy shared by the index, resolver and analyses

use thiserror::Error;

/// Failures the engine distinguishes between.
///
/// Most of these are non-fatal: callers log them and keep going. Unresolved
/// imports are not represented at all since they are dropped silently.
#[derive(Debug, Error)]
pub enum VibeError {
    /// File could not be read; the sweep skips it.
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Extractor could not recognize the file; it is kept with zero symbols.
    #[error("cannot parse {path}: {reason}")]
    Parse { path: String, reason: String },

    /// A single configuration entry was rejected.
    #[error("invalid config entry `{entry}`: {reason}")]
    Config { entry: String, reason: String },

    /// No repository, or the VCS executable is missing, failing or hung.
    #[error("history unavailable: {0}")]
    HistoryUnavailable(String),

    #[error("unknown edge kind `{0}`")]
    UnknownEdgeKind(String),
}
