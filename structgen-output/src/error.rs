//! Error types for schema handling and output parsing.

use thiserror::Error;

/// Errors raised while building schemas or parsing model output.
///
/// Validation failures are not errors; they are reported as data through
/// [`ValidationReport`](crate::ValidationReport).
#[derive(Debug, Error)]
pub enum OutputError {
    /// The schema document could not be compiled.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// No JSON object or array was found in the text.
    #[error("no JSON object or array found in output")]
    NoJsonFound,

    /// JSON text failed to parse or deserialize.
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Unknown generation mode string.
    #[error("unknown generation mode '{0}' (expected auto, json or tool)")]
    UnknownMode(String),
}

/// Result alias for output operations.
pub type OutputResult<T> = Result<T, OutputError>;
