//! Generation errors.

use structgen_core::ValidationError;
use structgen_models::ModelError;
use structgen_output::OutputError;
use thiserror::Error;

/// Errors returned by [`Generator`](crate::Generator) and
/// [`LatexFixer`](crate::LatexFixer).
#[derive(Debug, Error)]
pub enum GenerationError {
    /// None of the requested models could be resolved.
    #[error("no model available among {candidates:?}")]
    NoModelAvailable {
        /// Identifiers that were tried.
        candidates: Vec<String>,
    },

    /// The model call failed after transport retries.
    #[error("model call failed: {0}")]
    Transport(#[from] ModelError),

    /// No output satisfied the schema once the feedback budget was spent.
    #[error("invalid generation after {attempts} attempt(s): {}", join(.errors))]
    InvalidGeneration {
        /// Errors of the last attempt.
        errors: Vec<ValidationError>,
        /// Generation calls made.
        attempts: u32,
    },

    /// The model answered with nothing usable.
    #[error("model '{model}' returned an empty result")]
    EmptyResult {
        /// Model identifier.
        model: String,
    },

    /// The caller cancelled the call.
    #[error("generation cancelled")]
    Cancelled,

    /// The request or a schema is malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A validated value did not fit the requested Rust type.
    #[error("validated output does not match the target type: {0}")]
    Deserialize(#[source] serde_json::Error),

    /// The rewriter got an answer it cannot apply.
    #[error("rewrite failed: {0}")]
    Rewrite(String),
}

impl GenerationError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Whether the failure is environmental, so the same request may succeed
    /// later, as opposed to the input being unsatisfiable.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Cancelled)
    }

    /// Validation errors of the last attempt, if any.
    #[must_use]
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            Self::InvalidGeneration { errors, .. } => errors,
            _ => &[],
        }
    }
}

impl From<OutputError> for GenerationError {
    fn from(err: OutputError) -> Self {
        Self::Configuration(err.to_string())
    }
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for generation.
pub type GenerationResult<T> = Result<T, GenerationError>;
