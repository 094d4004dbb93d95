//! Recoverable error data.
//!
//! Nothing in this module is returned through `Err`: schema violations and
//! per-choice rejections are collected as values so that one bad choice never
//! aborts its siblings.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A single schema violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// JSON pointer to the offending value (`""` for the root).
    pub path: String,
    /// Human readable description.
    pub message: String,
}

impl ValidationError {
    /// Create a new validation error.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an error located at the root of the value.
    pub fn root(message: impl Into<String>) -> Self {
        Self::new("", message)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Why a choice was dropped from a model response.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChoiceRejection {
    /// The choice called a function but the request declared none.
    #[error("function call present but no functions were declared")]
    NoDeclaredFunctions,

    /// The function call carried no name.
    #[error("function call has no name")]
    MissingFunctionName,

    /// The function name is not among the declared functions.
    #[error("unresolved function call '{name}'")]
    UnresolvedFunctionCall {
        /// Name the model used.
        name: String,
    },

    /// The arguments were absent or failed to parse.
    #[error("function call '{name}' has no parsed arguments")]
    MissingArguments {
        /// Function name.
        name: String,
        /// Errors recorded while parsing the raw arguments.
        parse_errors: Vec<String>,
    },

    /// The arguments did not satisfy the declared parameter schema.
    #[error("arguments for '{name}' failed validation: {}", join_errors(.errors))]
    SchemaValidationFailure {
        /// Function name.
        name: String,
        /// Individual violations.
        errors: Vec<ValidationError>,
    },

    /// The declaration's own parameter schema could not be compiled.
    #[error("declared schema for '{name}' is invalid: {message}")]
    InvalidDeclaration {
        /// Function name.
        name: String,
        /// Compile error.
        message: String,
    },
}

impl ChoiceRejection {
    /// Validation errors carried by this rejection, if any.
    #[must_use]
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            Self::SchemaValidationFailure { errors, .. } => errors,
            _ => &[],
        }
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A dropped choice together with the reason it was dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedChoice {
    /// Index of the choice in the original response.
    pub index: u32,
    /// Reason for the drop.
    pub reason: ChoiceRejection,
}
