//! # structgen - schema-validated structured generation
//!
//! structgen asks language models for objects that must satisfy a JSON Schema.
//! It declares the schema as a function (or asks for JSON in the prompt),
//! repairs and validates what comes back, drops choices that do not conform
//! and, within a feedback budget, sends validation errors back to the model
//! for a corrected answer.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use serde::Deserialize;
//! use serde_json::json;
//! use structgen::prelude::*;
//!
//! #[derive(Debug, Deserialize)]
//! struct Capital {
//!     city: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), GenerationError> {
//!     let schema = Schema::new(json!({
//!         "type": "object",
//!         "properties": {"city": {"type": "string"}},
//!         "required": ["city"]
//!     }))?;
//!
//!     let generator = Generator::with_defaults();
//!     let result = generator
//!         .gen_object::<Capital>(
//!             GenerationRequest::new(schema)
//!                 .model("openai:gpt-4o-mini")
//!                 .prompt("What is the capital of Norway?")
//!                 .max_feedback_loops(2),
//!         )
//!         .await?;
//!     println!("{} ({} attempt(s))", result.object.city, result.attempts);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description | Default |
//! |---------|-------------|--------|
//! | `openai` | OpenAI-compatible chat completions model | ✅ |
//!
//! ## Architecture
//!
//! - [`structgen_core`] - messages, responses, declarations, rejections
//! - [`structgen_output`] - schemas, argument repair, response validation
//! - [`structgen_models`] - model trait, registry, selection, providers
//! - [`structgen_retries`] - transport retry policy
//! - this crate - the generation loop, streaming and [`LatexFixer`]

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod error;
pub mod generator;
pub mod latex;
pub mod prompts;
pub mod request;
pub mod stream;

// ============================================================================
// Crate Re-exports
// ============================================================================

/// Messages, responses and declarations.
pub use structgen_core as core;

/// Models, registry and providers.
pub use structgen_models as models;

/// Schemas and response validation.
pub use structgen_output as output;

/// Transport retry policy.
pub use structgen_retries as retries;

// ============================================================================
// Flat Re-exports
// ============================================================================

pub use error::{GenerationError, GenerationResult};
pub use generator::{GenObjectResult, Generator, GeneratorConfig};
pub use latex::{FixOutput, LatexFixer, LATEX_FIXER_INSTRUCTIONS};
pub use prompts::{
    render_feedback, DEFAULT_FEEDBACK_PROMPT, DEFAULT_OUTPUT_DESCRIPTION,
    DEFAULT_OUTPUT_FUNCTION_NAME,
};
pub use request::GenerationRequest;
pub use stream::{GenStream, GenStreamEvent};

pub use structgen_core::{
    ModelMessage, ModelResponse, ModelSettings, RejectedChoice, RequestUsage, ValidationError,
};
pub use structgen_models::{Model, ModelError, ModelPicking, ModelRegistry};
pub use structgen_output::{GenerationMode, Schema};
pub use structgen_retries::{RetryConfig, WaitStrategy};
pub use tokio_util::sync::CancellationToken;

#[cfg(feature = "openai")]
#[cfg_attr(docsrs, doc(cfg(feature = "openai")))]
pub use structgen_models::OpenAIChatModel;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        CancellationToken, GenObjectResult, GenStreamEvent, GenerationError, GenerationMode,
        GenerationRequest, Generator, GeneratorConfig, LatexFixer, ModelMessage, ModelPicking,
        ModelRegistry, ModelSettings, RetryConfig, Schema,
    };
}
