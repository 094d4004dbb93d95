//! # structgen-core
//!
//! Core types shared by the structgen crates.
//!
//! - **Messages**: the conversation sent to a model ([`ModelMessage`])
//! - **Responses**: [`ModelResponse`] with independent [`Choice`]s, each
//!   optionally carrying a [`FunctionCall`]
//! - **Functions**: [`FunctionDeclaration`]s a model may call by name
//! - **Errors**: the per-choice rejection taxonomy ([`ChoiceRejection`]) and
//!   schema [`ValidationError`]s, both surfaced as data
//! - **Settings** and **Usage**: generation parameters and token accounting
//!
//! ## Example
//!
//! ```rust
//! use structgen_core::{Choice, FunctionArguments, FunctionCall, ModelResponse};
//!
//! let response = ModelResponse::new(vec![
//!     Choice::text(0, "plain answer"),
//!     Choice::function(
//!         1,
//!         FunctionCall::new("output", FunctionArguments::parsed(r#"{"a":1}"#, serde_json::json!({"a": 1}))),
//!     ),
//! ]);
//!
//! assert_eq!(response.choices.len(), 2);
//! assert!(response.choices[1].function_call().is_some());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod errors;
pub mod function;
pub mod messages;
pub mod response;
pub mod settings;
pub mod usage;

pub use errors::{ChoiceRejection, RejectedChoice, ValidationError};
pub use function::FunctionDeclaration;
pub use messages::{MessageRole, ModelMessage};
pub use response::{
    AssistantMessage, Choice, FinishReason, FunctionArguments, FunctionCall, ModelResponse,
};
pub use settings::ModelSettings;
pub use usage::RequestUsage;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        Choice, ChoiceRejection, FunctionArguments, FunctionCall, FunctionDeclaration,
        MessageRole, ModelMessage, ModelResponse, ModelSettings, RequestUsage, ValidationError,
    };
}
