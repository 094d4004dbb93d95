//! Core model trait and request parameters.
//!
//! The [`Model`] trait is the only boundary between structgen and a model
//! provider: an async call that takes messages and returns a
//! [`ModelResponse`]. Wire formats stay inside each implementation.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use structgen_core::{FunctionDeclaration, ModelMessage, ModelResponse, ModelSettings};

use crate::delta::ResponseDelta;
use crate::error::ModelError;
use crate::profile::ModelProfile;

/// Parameters describing what the caller expects back.
#[derive(Debug, Clone, Default)]
pub struct ModelRequestParameters {
    /// Functions the model may call.
    pub functions: Arc<Vec<FunctionDeclaration>>,
    /// How the model should pick a function.
    pub function_choice: Option<FunctionChoice>,
    /// Ask for a JSON document as text content (native JSON mode).
    pub json_mode: bool,
}

impl ModelRequestParameters {
    /// Empty parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare functions.
    #[must_use]
    pub fn with_functions(mut self, functions: Vec<FunctionDeclaration>) -> Self {
        self.functions = Arc::new(functions);
        self
    }

    /// Set the function choice.
    #[must_use]
    pub fn with_function_choice(mut self, choice: FunctionChoice) -> Self {
        self.function_choice = Some(choice);
        self
    }

    /// Request native JSON output.
    #[must_use]
    pub fn with_json_mode(mut self, json_mode: bool) -> Self {
        self.json_mode = json_mode;
        self
    }
}

/// Function choice strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FunctionChoice {
    /// Model decides whether to call a function.
    #[default]
    Auto,
    /// Model must call some function.
    Required,
    /// Model must not call functions.
    None,
    /// Model must call the named function.
    Specific(String),
}

/// Stream of incremental response pieces.
pub type StreamedResponse = Pin<Box<dyn Stream<Item = Result<ResponseDelta, ModelError>> + Send>>;

/// A language model.
#[async_trait]
pub trait Model: Send + Sync {
    /// Model name within its provider, e.g. `gpt-4o-mini`.
    fn name(&self) -> &str;

    /// Provider name, e.g. `openai`.
    fn system(&self) -> &str;

    /// Full `provider:modelTag` identifier.
    fn identifier(&self) -> String {
        format!("{}:{}", self.system(), self.name())
    }

    /// Perform one round trip.
    async fn request(
        &self,
        messages: &[ModelMessage],
        settings: &ModelSettings,
        params: &ModelRequestParameters,
    ) -> Result<ModelResponse, ModelError>;

    /// Perform one round trip, streaming the answer.
    ///
    /// The default issues a normal request and yields one delta per choice.
    async fn request_stream(
        &self,
        messages: &[ModelMessage],
        settings: &ModelSettings,
        params: &ModelRequestParameters,
    ) -> Result<StreamedResponse, ModelError> {
        let response = self.request(messages, settings, params).await?;
        let deltas = ResponseDelta::from_response(&response);
        Ok(Box::pin(futures::stream::iter(deltas.into_iter().map(Ok))))
    }

    /// Capabilities and ranking hints.
    fn profile(&self) -> &ModelProfile;
}

/// Shared model handle.
pub type BoxedModel = Arc<dyn Model>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::ResponseAccumulator;
    use crate::mock::MockModel;
    use futures::StreamExt;
    use structgen_core::{FunctionArguments, FunctionCall};

    #[test]
    fn test_parameters_builder() {
        let params = ModelRequestParameters::new()
            .with_functions(vec![FunctionDeclaration::new("output", "")])
            .with_function_choice(FunctionChoice::Specific("output".into()))
            .with_json_mode(false);

        assert_eq!(params.functions.len(), 1);
        assert_eq!(
            params.function_choice,
            Some(FunctionChoice::Specific("output".into()))
        );
        assert_eq!(FunctionChoice::default(), FunctionChoice::Auto);
    }

    #[tokio::test]
    async fn test_default_stream_falls_back_to_request() {
        let call = FunctionCall::new("output", FunctionArguments::from_value(serde_json::json!({"a": 1})));
        let model = MockModel::new("m").with_response(ModelResponse::function_call(call));

        let mut stream = model
            .request_stream(
                &[ModelMessage::user("hi")],
                &ModelSettings::default(),
                &ModelRequestParameters::default(),
            )
            .await
            .unwrap();

        let mut acc = ResponseAccumulator::new();
        let mut count = 0;
        while let Some(delta) = stream.next().await {
            acc.push(&delta.unwrap());
            count += 1;
        }
        assert_eq!(count, 1);

        let response = acc.finish();
        let args = &response.choices[0].function_call().unwrap().arguments;
        assert_eq!(args.value(), Some(&serde_json::json!({"a": 1})));
        assert_eq!(model.identifier(), "mock:m");
    }
}
