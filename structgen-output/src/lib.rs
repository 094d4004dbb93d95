//! # structgen-output
//!
//! Schema validation and recovery of structured model output.
//!
//! ## Core Concepts
//!
//! - **[`Schema`]**: a compiled JSON Schema; [`Schema::validate`] returns a
//!   [`ValidationReport`] instead of failing
//! - **[`parse_arguments`]**: raw function-call arguments to
//!   [`FunctionArguments`](structgen_core::FunctionArguments), with a
//!   conservative repair pass
//! - **[`validate_response`]**: drops choices whose function call does not
//!   resolve, did not parse, or does not match its declared schema
//! - **[`GenerationMode`]**: how a structured object is requested
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use structgen_core::{Choice, FunctionCall, FunctionDeclaration, ModelResponse};
//! use structgen_output::{parse_arguments, validate_response};
//!
//! let declared = vec![FunctionDeclaration::new("bar", "").with_parameters(json!({
//!     "type": "object",
//!     "properties": {"n": {"type": "integer"}},
//!     "required": ["n"]
//! }))];
//!
//! let response = ModelResponse::new(vec![
//!     Choice::function(0, FunctionCall::new("foo", parse_arguments(r#"{"n": 1}"#))),
//!     Choice::function(1, FunctionCall::new("bar", parse_arguments(r#"{"n": 2}"#))),
//! ]);
//!
//! let filtered = validate_response(response, &declared);
//! assert_eq!(filtered.choices.len(), 1);
//! assert_eq!(filtered.choices[0].index, 1);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod arguments;
pub mod error;
pub mod mode;
pub mod parser;
pub mod repair;
pub mod schema;
pub mod validator;

pub use arguments::parse_arguments;
pub use error::{OutputError, OutputResult};
pub use mode::GenerationMode;
pub use parser::{extract_json_from_text, parse_json_from_text, parse_partial_json};
pub use schema::{validate, Schema, ValidationReport};
pub use structgen_core::ValidationError;
pub use validator::{validate_response, validate_response_with_report, ValidatedResponse};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        parse_arguments, validate, validate_response, validate_response_with_report,
        GenerationMode, OutputError, Schema, ValidatedResponse, ValidationError,
        ValidationReport,
    };
}
