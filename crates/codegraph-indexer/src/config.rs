//! Enumerated configuration (spec §6). Loadable from an optional
//! `.codegraph.toml` at the project root; unknown keys are a validation
//! error (spec §9: "unknown options are a validation error").

use std::collections::HashMap;
use std::path::Path;

use codegraph_core::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct IndexerConfig {
    pub extensions: Vec<String>,
    pub ignore: Vec<String>,
    pub deep_analysis: bool,
    pub include_externals: bool,
    pub debounce_ms: u64,
    pub stability_ms: u64,
    pub analytics_schedule: AnalyticsScheduleConfig,
    pub cache_ttl_seconds: HashMap<String, u64>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        IndexerConfig {
            extensions: default_extensions(),
            ignore: Vec::new(),
            deep_analysis: false,
            include_externals: true,
            debounce_ms: 500,
            stability_ms: 300,
            analytics_schedule: AnalyticsScheduleConfig::default(),
            cache_ttl_seconds: default_cache_ttls(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct AnalyticsScheduleConfig {
    pub on_ingestion: bool,
    pub on_file_change: bool,
    pub on_git_commit: bool,
    pub periodic: Vec<String>,
}

impl Default for AnalyticsScheduleConfig {
    fn default() -> Self {
        AnalyticsScheduleConfig {
            on_ingestion: true,
            on_file_change: true,
            on_git_commit: false,
            periodic: Vec::new(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    ["ts", "tsx", "js", "jsx", "mjs", "cjs", "py"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_cache_ttls() -> HashMap<String, u64> {
    [
        ("security", 300),
        ("complexity", 300),
        ("refactoring", 600),
        ("dataflow", 600),
        ("impact", 120),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Ignore globs every scan applies regardless of configuration — spec §4.1:
/// "ignore list MUST default to at least VCS metadata, dependency stores,
/// build/output directories, coverage, test/spec files, framework caches."
pub fn default_ignore_globs() -> Vec<String> {
    [
        ".git/**",
        ".svn/**",
        ".hg/**",
        "node_modules/**",
        "vendor/**",
        "target/**",
        "dist/**",
        "build/**",
        "out/**",
        "coverage/**",
        "__pycache__/**",
        ".pytest_cache/**",
        ".cache/**",
        ".codegraph/**",
        "**/*.test.*",
        "**/*.spec.*",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Platform/standard-library identifiers always resolved as external rather
/// than searched for in the registry (spec §4.4: "implementers MUST expose
/// this list as configuration").
pub fn builtin_denylist() -> &'static [&'static str] {
    &[
        "console", "require", "module", "exports", "process", "global",
        "Object", "Array", "Promise", "Math", "JSON", "Map", "Set", "Symbol",
        "Error", "TypeError", "RangeError", "Date", "RegExp", "Reflect",
        "setTimeout", "setInterval", "clearTimeout", "clearInterval",
        "fetch", "Buffer", "__dirname", "__filename",
    ]
}

impl IndexerConfig {
    /// Load `.codegraph.toml` from `root` if present; defaults otherwise.
    pub fn load(root: &Path) -> CoreResult<Self> {
        let path = root.join(".codegraph.toml");
        if !path.exists() {
            return Ok(IndexerConfig::default());
        }
        let text = std::fs::read_to_string(&path)
            .map_err(|e| CoreError::Validation(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&text).map_err(|e| CoreError::Validation(format!("invalid {}: {e}", path.display())))
    }

    /// The full ignore set: built-in defaults plus the caller's additions
    /// (spec §6: "`ignore`: glob list — caller-supplied append to defaults").
    pub fn effective_ignore_globs(&self) -> Vec<String> {
        let mut globs = default_ignore_globs();
        globs.extend(self.ignore.iter().cloned());
        globs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = IndexerConfig::default();
        assert!(config.extensions.contains(&"ts".to_string()));
        assert!(config.include_externals);
        assert_eq!(config.debounce_ms, 500);
        assert_eq!(config.stability_ms, 300);
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = IndexerConfig::load(dir.path()).unwrap();
        assert_eq!(config.extensions, IndexerConfig::default().extensions);
    }

    #[test]
    fn load_rejects_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".codegraph.toml"), "bogus_key = true\n").unwrap();
        let result = IndexerConfig::load(dir.path());
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn effective_ignore_globs_appends_to_defaults() {
        let mut config = IndexerConfig::default();
        config.ignore.push("fixtures/**".to_string());
        let globs = config.effective_ignore_globs();
        assert!(globs.contains(&"fixtures/**".to_string()));
        assert!(globs.contains(&"node_modules/**".to_string()));
    }
}
