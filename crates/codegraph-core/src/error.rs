//! Error taxonomy shared by every layer — spec §7.

use std::path::PathBuf;

/// The error kinds spec §7 enumerates. Every fallible core operation returns
/// `Result<T, CoreError>`; only the ingestion orchestrator aggregates
/// per-file instances of these into `ParseResult.errorCount` (spec §6/§7).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Bad path, bad direction, empty query, unsupported extension, unknown
    /// configuration key. Surfaced to the caller; no state change.
    #[error("validation error: {0}")]
    Validation(String),

    /// Entity ID unresolvable, file path not indexed.
    #[error("not found: {0}")]
    NotFound(String),

    /// A language plugin failed to parse one file. The file's previous graph
    /// state is preserved.
    #[error("failed to parse {path}: {message}")]
    ParseFailure { path: PathBuf, message: String },

    /// The graph engine returned an error mid-operation. The offending file's
    /// batch aborts; other files are unaffected.
    #[error("storage failure: {0}")]
    StorageFailure(String),

    /// A per-file operation was cancelled or exceeded its deadline. Behaves
    /// like `ParseFailure` for the affected file.
    #[error("cancelled or timed out: {0}")]
    CancellationOrTimeout(String),

    /// Root path missing, engine unreachable at startup. No partial state.
    #[error("fatal: {0}")]
    Fatal(String),

    /// A `deleteFileEntities`/`deleteProject` call targeted something the
    /// store has no record of, or the cascade delete itself failed partway.
    #[error("delete failed: {0}")]
    DeleteFailure(String),

    /// The request shape itself is malformed — an unrecognized enum value
    /// in a path/query segment — as opposed to a well-formed but invalid
    /// value caught by domain validation.
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl CoreError {
    /// The `error.code` value spec §6's error envelope requires.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "VALIDATION_ERROR",
            CoreError::NotFound(_) => "NOT_FOUND",
            CoreError::ParseFailure { .. } => "PARSE_ERROR",
            CoreError::StorageFailure(_) => "INTERNAL_ERROR",
            CoreError::CancellationOrTimeout(_) => "PARSE_ERROR",
            CoreError::Fatal(_) => "INTERNAL_ERROR",
            CoreError::DeleteFailure(_) => "DELETE_ERROR",
            CoreError::BadRequest(_) => "BAD_REQUEST",
        }
    }

    /// Whether this error kind corresponds to an HTTP 4xx (client at fault)
    /// as opposed to a 5xx.
    pub fn is_client_error(&self) -> bool {
        matches!(self, CoreError::Validation(_) | CoreError::NotFound(_) | CoreError::BadRequest(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_error_kind_maps_to_a_code() {
        let cases = [
            (CoreError::Validation("x".into()), "VALIDATION_ERROR"),
            (CoreError::NotFound("x".into()), "NOT_FOUND"),
            (CoreError::ParseFailure { path: PathBuf::from("a"), message: "x".into() }, "PARSE_ERROR"),
            (CoreError::StorageFailure("x".into()), "INTERNAL_ERROR"),
            (CoreError::CancellationOrTimeout("x".into()), "PARSE_ERROR"),
            (CoreError::Fatal("x".into()), "INTERNAL_ERROR"),
            (CoreError::DeleteFailure("x".into()), "DELETE_ERROR"),
            (CoreError::BadRequest("x".into()), "BAD_REQUEST"),
        ];
        for (err, code) in cases {
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn bad_request_is_a_client_error() {
        assert!(CoreError::BadRequest("x".into()).is_client_error());
    }
}
