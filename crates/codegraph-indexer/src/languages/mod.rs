//! Language plugin registry (spec §4.3). New languages are added here by
//! implementing `LanguageExtractor` and registering an extension below —
//! everything beyond TypeScript/JavaScript currently falls back to the
//! no-op generic plugin (spec §9).

pub mod generic;
pub mod javascript;
pub mod typescript;

use std::sync::Arc;

use crate::extractor::LanguageExtractor;
use crate::parser_pool::ParserPool;

/// Look up the plugin registered for a file extension (without the dot).
pub fn for_extension(ext: &str, parser_pool: &ParserPool) -> Arc<dyn LanguageExtractor> {
    match ext {
        "ts" | "tsx" => Arc::new(typescript::TypeScriptExtractor::new(parser_pool.clone())),
        "js" | "jsx" | "mjs" | "cjs" => Arc::new(javascript::JavaScriptExtractor::new(parser_pool.clone())),
        _ => Arc::new(generic::GenericExtractor),
    }
}
