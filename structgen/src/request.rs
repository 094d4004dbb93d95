//! Per-call generation requests.

use std::time::Duration;
use structgen_core::{ModelMessage, ModelSettings};
use structgen_models::ModelPicking;
use structgen_output::{GenerationMode, Schema};
use tokio_util::sync::CancellationToken;

/// Everything one [`Generator::gen_object`](crate::Generator::gen_object)
/// call needs.
///
/// ```rust
/// use serde_json::json;
/// use structgen::{GenerationRequest, Schema};
///
/// let schema = Schema::new(json!({
///     "type": "object",
///     "properties": {"city": {"type": "string"}},
///     "required": ["city"]
/// }))
/// .unwrap();
///
/// let request = GenerationRequest::new(schema)
///     .model("openai:gpt-4o-mini")
///     .prompt("Name the capital of Norway.")
///     .max_feedback_loops(2);
/// assert_eq!(request.models, vec!["openai:gpt-4o-mini".to_string()]);
/// ```
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Candidate model identifiers, `provider:modelTag`.
    pub models: Vec<String>,
    /// How to choose among several candidates.
    pub picking: Option<ModelPicking>,
    /// Conversation sent to the model.
    pub messages: Vec<ModelMessage>,
    /// Schema the object must satisfy.
    pub schema: Schema,
    /// Description of the output function in tool mode.
    pub description: Option<String>,
    /// Mode override.
    pub mode: Option<GenerationMode>,
    /// Follow-up calls allowed after an invalid answer.
    pub max_feedback_loops: u32,
    /// Model used for follow-up calls.
    pub feedback_model: Option<String>,
    /// Instruction sent with follow-up calls.
    pub feedback_prompt: Option<String>,
    /// Schema of a reasoning object produced before the output.
    pub thinking: Option<Schema>,
    /// Per-round-trip timeout.
    pub timeout: Option<Duration>,
    /// Settings laid over the generator defaults.
    pub settings: Option<ModelSettings>,
    /// Cancels the call when triggered.
    pub cancellation: Option<CancellationToken>,
}

impl GenerationRequest {
    /// Request an object matching `schema`.
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        Self {
            models: Vec::new(),
            picking: None,
            messages: Vec::new(),
            schema,
            description: None,
            mode: None,
            max_feedback_loops: 0,
            feedback_model: None,
            feedback_prompt: None,
            thinking: None,
            timeout: None,
            settings: None,
            cancellation: None,
        }
    }

    /// Add a candidate model.
    #[must_use]
    pub fn model(mut self, id: impl Into<String>) -> Self {
        self.models.push(id.into());
        self
    }

    /// Add several candidate models.
    #[must_use]
    pub fn models<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Rank candidates by a preference instead of taking the first.
    #[must_use]
    pub fn picking(mut self, picking: ModelPicking) -> Self {
        self.picking = Some(picking);
        self
    }

    /// Append a system message.
    #[must_use]
    pub fn system(mut self, content: impl Into<String>) -> Self {
        self.messages.push(ModelMessage::system(content));
        self
    }

    /// Append a user message.
    #[must_use]
    pub fn prompt(mut self, content: impl Into<String>) -> Self {
        self.messages.push(ModelMessage::user(content));
        self
    }

    /// Append messages.
    #[must_use]
    pub fn messages(mut self, messages: impl IntoIterator<Item = ModelMessage>) -> Self {
        self.messages.extend(messages);
        self
    }

    /// Describe the output function.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Force a mode.
    #[must_use]
    pub fn mode(mut self, mode: GenerationMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Allow this many follow-up calls.
    #[must_use]
    pub fn max_feedback_loops(mut self, loops: u32) -> Self {
        self.max_feedback_loops = loops;
        self
    }

    /// Send follow-up calls to another model.
    #[must_use]
    pub fn feedback_model(mut self, id: impl Into<String>) -> Self {
        self.feedback_model = Some(id.into());
        self
    }

    /// Replace the default correction instruction.
    #[must_use]
    pub fn feedback_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.feedback_prompt = Some(prompt.into());
        self
    }

    /// Ask for a reasoning object matching `schema` before the output.
    #[must_use]
    pub fn thinking(mut self, schema: Schema) -> Self {
        self.thinking = Some(schema);
        self
    }

    /// Bound each round trip.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override model settings.
    #[must_use]
    pub fn settings(mut self, settings: ModelSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Cancel through `token`.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}
