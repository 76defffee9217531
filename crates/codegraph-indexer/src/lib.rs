//! Filesystem scanning, change detection, language extraction, and symbol
//! resolution — the pipeline that turns a project tree into graph writes.

pub mod change_detector;
pub mod config;
pub mod coordinator;
pub mod extractor;
pub mod languages;
pub mod parser_pool;
pub mod scanner;
pub mod symbols;

pub use change_detector::{ChangeSummary, FileChange, FileChangeKind, StoredFile};
pub use config::{AnalyticsScheduleConfig, IndexerConfig};
pub use coordinator::{Coordinator, FileError, IngestReport, IngestStats};
pub use extractor::{ExtractedFile, ImportSpecifier, LanguageExtractor, UnresolvedEdge};
pub use scanner::ScannedFile;
pub use symbols::SymbolRegistry;
