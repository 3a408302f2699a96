//! File walking, symbol extraction, dependency resolution and the index sweep

pub mod coordinator;
pub mod extractor;
pub mod languages;
pub mod parser_pool;
pub mod resolve;
pub mod walk;

pub use coordinator::{CancelFlag, Coordinator, ResolvedEdges, ScanReport};
pub use extractor::{ExtractionResult, LanguageExtractor, PyImport, RawImport};
pub use resolve::ResolverContext;
