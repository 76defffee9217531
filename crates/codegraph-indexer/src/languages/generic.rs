//! Fallback plugin for any recognized extension with no bound extractor.
//! Every language beyond the TS/JS reference plugin is an external,
//! unbound extension point (spec §9) — the orchestrator still creates the
//! File node, but entity extraction fails per-file rather than silently
//! producing an empty result, and the file's previous graph state (if any)
//! is preserved (spec §7's `ParseFailure` semantics).

use std::path::Path;

use codegraph_core::{CoreError, CoreResult};

use crate::extractor::{ExtractedFile, LanguageExtractor};

pub struct GenericExtractor;

impl LanguageExtractor for GenericExtractor {
    fn language_id(&self) -> &'static str {
        "generic"
    }

    fn extract(&self, path: &Path, _content: &str) -> CoreResult<ExtractedFile> {
        Err(CoreError::ParseFailure {
            path: path.to_path_buf(),
            message: "no language plugin registered for this extension".to_string(),
        })
    }
}
