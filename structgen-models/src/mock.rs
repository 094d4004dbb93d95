//! Mock and function-based models for testing.
//!
//! - [`MockModel`]: replays a queue of pre-configured replies and records
//!   every request it receives
//! - [`FunctionModel`]: answers through a closure, with an optional latency
//!
//! ```rust
//! use structgen_models::MockModel;
//!
//! let model = MockModel::new("test")
//!     .with_text_response("first")
//!     .with_text_response("second");
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use structgen_core::{FunctionCall, ModelMessage, ModelResponse, ModelSettings};
use structgen_output::parse_arguments;

use crate::error::ModelError;
use crate::model::{Model, ModelRequestParameters};
use crate::profile::ModelProfile;

/// A request as seen by a test double.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Conversation sent.
    pub messages: Vec<ModelMessage>,
    /// Settings sent.
    pub settings: ModelSettings,
    /// Parameters sent.
    pub params: ModelRequestParameters,
}

type ErrorFactory = Arc<dyn Fn() -> ModelError + Send + Sync>;

#[derive(Clone)]
enum MockReply {
    Response(ModelResponse),
    Error(ErrorFactory),
}

impl fmt::Debug for MockReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MockReply::Response(r) => f.debug_tuple("Response").field(r).finish(),
            MockReply::Error(_) => f.write_str("Error(..)"),
        }
    }
}

/// A mock model replaying queued replies in order.
///
/// Once the queue is empty every request gets a plain `"Mock response"`.
#[derive(Debug, Clone)]
pub struct MockModel {
    name: String,
    profile: ModelProfile,
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockModel {
    /// Create a mock model.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            profile: ModelProfile::default(),
            replies: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a response.
    #[must_use]
    pub fn with_response(self, response: ModelResponse) -> Self {
        self.replies.lock().push_back(MockReply::Response(response));
        self
    }

    /// Queue a text response.
    #[must_use]
    pub fn with_text_response(self, text: impl Into<String>) -> Self {
        let response = ModelResponse::text(text).with_model_name(self.name.clone());
        self.with_response(response)
    }

    /// Queue a function call whose raw arguments go through the argument parser.
    #[must_use]
    pub fn with_function_call(self, name: impl Into<String>, raw_arguments: &str) -> Self {
        let call = FunctionCall::new(name, parse_arguments(raw_arguments));
        let response = ModelResponse::function_call(call).with_model_name(self.name.clone());
        self.with_response(response)
    }

    /// Queue an error.
    #[must_use]
    pub fn with_error<F>(self, make: F) -> Self
    where
        F: Fn() -> ModelError + Send + Sync + 'static,
    {
        self.replies.lock().push_back(MockReply::Error(Arc::new(make)));
        self
    }

    /// Set a custom profile.
    #[must_use]
    pub fn with_profile(mut self, profile: ModelProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Requests received so far.
    #[must_use]
    pub fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests received so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Forget recorded requests.
    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }
}

#[async_trait]
impl Model for MockModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn system(&self) -> &str {
        "mock"
    }

    fn profile(&self) -> &ModelProfile {
        &self.profile
    }

    async fn request(
        &self,
        messages: &[ModelMessage],
        settings: &ModelSettings,
        params: &ModelRequestParameters,
    ) -> Result<ModelResponse, ModelError> {
        self.requests.lock().push(RecordedRequest {
            messages: messages.to_vec(),
            settings: settings.clone(),
            params: params.clone(),
        });

        let reply = self.replies.lock().pop_front();
        match reply {
            Some(MockReply::Response(response)) => Ok(response),
            Some(MockReply::Error(make)) => Err(make()),
            None => Ok(ModelResponse::text("Mock response").with_model_name(self.name.clone())),
        }
    }
}

/// Closure answering a request.
pub type FunctionDef = Box<
    dyn Fn(&[ModelMessage], &ModelRequestParameters) -> Result<ModelResponse, ModelError>
        + Send
        + Sync,
>;

/// A model controlled by a local function.
#[derive(Clone)]
pub struct FunctionModel {
    name: String,
    profile: ModelProfile,
    function: Arc<FunctionDef>,
    latency: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl fmt::Debug for FunctionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionModel")
            .field("name", &self.name)
            .field("profile", &self.profile)
            .field("latency", &self.latency)
            .field("calls", &self.call_count())
            .finish()
    }
}

impl FunctionModel {
    /// Model answering with `function`.
    pub fn new<F>(function: F) -> Self
    where
        F: Fn(&[ModelMessage], &ModelRequestParameters) -> ModelResponse + Send + Sync + 'static,
    {
        Self::fallible(move |messages, params| Ok(function(messages, params)))
    }

    /// Model answering with a function that may fail.
    pub fn fallible<F>(function: F) -> Self
    where
        F: Fn(&[ModelMessage], &ModelRequestParameters) -> Result<ModelResponse, ModelError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: "function-model".to_string(),
            profile: ModelProfile::default(),
            function: Arc::new(Box::new(function)),
            latency: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always answer with the same text.
    pub fn constant_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(move |_, _| ModelResponse::text(text.clone()))
    }

    /// Always call `name` with the given arguments.
    pub fn function_call(name: impl Into<String>, arguments: JsonValue) -> Self {
        Self::raw_function_call(name, arguments.to_string())
    }

    /// Always call `name` with raw argument text.
    pub fn raw_function_call(name: impl Into<String>, raw_arguments: impl Into<String>) -> Self {
        let name = name.into();
        let raw = raw_arguments.into();
        Self::new(move |_, _| {
            ModelResponse::function_call(FunctionCall::new(name.clone(), parse_arguments(&raw)))
        })
    }

    /// Answer with each response in turn, starting over when exhausted.
    pub fn cycle(responses: Vec<ModelResponse>) -> Self {
        let counter = AtomicUsize::new(0);
        Self::fallible(move |_, _| {
            if responses.is_empty() {
                return Err(ModelError::invalid_response("no responses configured"));
            }
            let i = counter.fetch_add(1, Ordering::SeqCst) % responses.len();
            Ok(responses[i].clone())
        })
    }

    /// Set the model name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set a custom profile.
    #[must_use]
    pub fn with_profile(mut self, profile: ModelProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Wait this long before answering.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of requests received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Model for FunctionModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn system(&self) -> &str {
        "function"
    }

    fn profile(&self) -> &ModelProfile {
        &self.profile
    }

    async fn request(
        &self,
        messages: &[ModelMessage],
        _settings: &ModelSettings,
        params: &ModelRequestParameters,
    ) -> Result<ModelResponse, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        (self.function)(messages, params)
    }
}
