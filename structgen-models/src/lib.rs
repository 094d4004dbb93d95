//! # structgen-models
//!
//! Model trait, registry, selection and provider implementations for
//! structgen.
//!
//! - **[`Model`]**: one round trip with a language model, plain or streamed
//! - **[`ModelRegistry`]**: resolves `provider:modelTag` identifiers
//! - **[`select_model`]**: picks one model out of several candidates
//! - **OpenAI** (feature `openai`, default): chat completions over HTTP
//! - **[`MockModel`] / [`FunctionModel`]**: deterministic test doubles
//!
//! ## Example
//!
//! ```rust
//! use structgen_models::{select_model, MockModel, ModelPicking, ModelProfile, ModelRegistry};
//!
//! let registry = ModelRegistry::new()
//!     .with_model(MockModel::new("fast").with_profile(ModelProfile::new().with_ranks(5, 1)))
//!     .with_model(MockModel::new("smart").with_profile(ModelProfile::new().with_ranks(1, 5)));
//!
//! let candidates = vec!["mock:fast".to_string(), "mock:smart".to_string()];
//! let model = select_model(&registry, &candidates, Some(ModelPicking::Quality)).unwrap();
//! assert_eq!(model.name(), "smart");
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod delta;
pub mod error;
pub mod mock;
pub mod model;
pub mod profile;
pub mod registry;
pub mod selection;

/// OpenAI chat completion models.
#[cfg(feature = "openai")]
#[cfg_attr(docsrs, doc(cfg(feature = "openai")))]
pub mod openai;

pub use delta::{ResponseAccumulator, ResponseDelta};
pub use error::{ModelError, ModelResult};
pub use mock::{FunctionModel, MockModel, RecordedRequest};
pub use model::{BoxedModel, FunctionChoice, Model, ModelRequestParameters, StreamedResponse};
pub use profile::{openai_profile, ModelProfile, DEFAULT_JSON_INSTRUCTION_TEMPLATE};
pub use registry::{infer_model, ModelId, ModelRegistry, ProviderFactory};
pub use selection::{select_model, ModelPicking};

#[cfg(feature = "openai")]
pub use openai::OpenAIChatModel;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        infer_model, select_model, BoxedModel, FunctionChoice, Model, ModelError,
        ModelPicking, ModelProfile, ModelRegistry, ModelRequestParameters, ModelResult,
    };
}
