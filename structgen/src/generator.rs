//! The structured generation loop.
//!
//! One [`Generator::gen_object`] call selects a model, asks it for an object
//! in tool or JSON mode, validates the answer and, while the feedback budget
//! lasts, sends the validation errors back for a corrected answer.

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use structgen_core::{
    ChoiceRejection, FunctionDeclaration, ModelMessage, ModelResponse, ModelSettings,
    RequestUsage, ValidationError,
};
use structgen_models::{
    select_model, BoxedModel, FunctionChoice, Model, ModelError, ModelRegistry,
    ModelRequestParameters,
};
use structgen_output::{
    extract_json_from_text, parse_arguments, validate_response_with_report, GenerationMode, Schema,
};
use structgen_retries::{with_retry, RetryConfig};
use tracing::{debug, info, warn};

use crate::error::{GenerationError, GenerationResult};
use crate::prompts::{
    render_feedback, DEFAULT_FEEDBACK_PROMPT, DEFAULT_OUTPUT_DESCRIPTION,
    DEFAULT_OUTPUT_FUNCTION_NAME,
};
use crate::request::GenerationRequest;

/// Defaults shared by every call of a [`Generator`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    /// Mode used when a request does not set one.
    pub default_mode: GenerationMode,
    /// Correction instruction used when a request does not set one.
    pub feedback_prompt: String,
    /// Transport retry policy, separate from the feedback budget.
    pub retry: RetryConfig,
    /// Settings under every request's own settings.
    pub settings: ModelSettings,
    /// Name of the function declared in tool mode.
    pub output_function_name: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            default_mode: GenerationMode::Auto,
            feedback_prompt: DEFAULT_FEEDBACK_PROMPT.to_string(),
            retry: RetryConfig::default(),
            settings: ModelSettings::default(),
            output_function_name: DEFAULT_OUTPUT_FUNCTION_NAME.to_string(),
        }
    }
}

impl GeneratorConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default mode.
    #[must_use]
    pub fn default_mode(mut self, mode: GenerationMode) -> Self {
        self.default_mode = mode;
        self
    }

    /// Set the default correction instruction.
    #[must_use]
    pub fn feedback_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.feedback_prompt = prompt.into();
        self
    }

    /// Set the transport retry policy.
    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the default model settings.
    #[must_use]
    pub fn settings(mut self, settings: ModelSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the output function name.
    #[must_use]
    pub fn output_function_name(mut self, name: impl Into<String>) -> Self {
        self.output_function_name = name.into();
        self
    }
}

/// A validated object and how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct GenObjectResult<T> {
    /// The object.
    pub object: T,
    /// The object as JSON.
    pub value: JsonValue,
    /// Reasoning object, when a thinking schema was requested.
    pub thinking: Option<JsonValue>,
    /// Response the object came from, after choice filtering.
    pub response: ModelResponse,
    /// Identifier of the model that produced it.
    pub model: String,
    /// Generation calls made, transport retries excluded.
    pub attempts: u32,
    /// Usage summed over all attempts.
    pub usage: RequestUsage,
}

impl<T> GenObjectResult<T> {
    /// Replace the object, keeping everything else.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> GenObjectResult<U> {
        GenObjectResult {
            object: f(self.object),
            value: self.value,
            thinking: self.thinking,
            response: self.response,
            model: self.model,
            attempts: self.attempts,
            usage: self.usage,
        }
    }
}

/// Requests schema-conforming objects from models.
///
/// Cheap to clone; holds no per-call state.
#[derive(Debug, Clone)]
pub struct Generator {
    registry: Arc<ModelRegistry>,
    config: Arc<GeneratorConfig>,
}

impl Generator {
    /// Generator resolving models through `registry`.
    #[must_use]
    pub fn new(registry: ModelRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            config: Arc::new(GeneratorConfig::default()),
        }
    }

    /// Generator over the built-in providers.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(ModelRegistry::with_defaults())
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: GeneratorConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// The model registry.
    #[must_use]
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate an object and deserialize it into `T`.
    pub async fn gen_object<T: DeserializeOwned>(
        &self,
        request: GenerationRequest,
    ) -> GenerationResult<GenObjectResult<T>> {
        let result = self.gen_value(request).await?;
        let object = serde_json::from_value(result.value.clone())
            .map_err(GenerationError::Deserialize)?;
        Ok(result.map(|_| object))
    }

    /// Generate an object as JSON.
    pub async fn gen_value(
        &self,
        request: GenerationRequest,
    ) -> GenerationResult<GenObjectResult<JsonValue>> {
        match request.cancellation.clone() {
            Some(token) => tokio::select! {
                biased;
                () = token.cancelled() => Err(GenerationError::Cancelled),
                result = self.run(request) => result,
            },
            None => self.run(request).await,
        }
    }

    async fn run(&self, request: GenerationRequest) -> GenerationResult<GenObjectResult<JsonValue>> {
        let plan = self.prepare(&request)?;
        let feedback = match &request.feedback_model {
            Some(id) => Some(self.prepare_feedback(&plan, id)?),
            None => None,
        };
        let instruction = request
            .feedback_prompt
            .as_deref()
            .unwrap_or(&self.config.feedback_prompt);

        let mut messages = plan.messages.clone();
        let mut usage = RequestUsage::new();
        let mut remaining = request.max_feedback_loops;
        let mut attempts = 0u32;

        loop {
            let (model, params) = match (&feedback, attempts) {
                (Some((model, params)), 1..) => (model, params),
                _ => (&plan.model, &plan.params),
            };
            attempts += 1;
            debug!(
                model = %model.identifier(),
                attempt = attempts,
                mode = %plan.mode,
                "requesting structured output"
            );

            let response = self.call_model(model, &messages, &plan.settings, params).await?;
            if let Some(u) = &response.usage {
                usage.merge(u);
            }

            match plan.evaluate(response) {
                Evaluation::Valid { value, response } => {
                    debug!(attempt = attempts, "structured output accepted");
                    return Ok(plan.finish(value, response, model.identifier(), attempts, usage));
                }
                Evaluation::Empty => {
                    return Err(GenerationError::EmptyResult {
                        model: model.identifier(),
                    });
                }
                Evaluation::Invalid { output, errors } => {
                    if remaining == 0 {
                        warn!(attempts, errors = errors.len(), "feedback budget exhausted");
                        return Err(GenerationError::InvalidGeneration { errors, attempts });
                    }
                    remaining -= 1;
                    info!(
                        attempt = attempts,
                        remaining,
                        errors = errors.len(),
                        "answer failed validation, asking for a correction"
                    );
                    messages = plan.messages.clone();
                    messages.push(ModelMessage::assistant(output));
                    messages.push(ModelMessage::user(render_feedback(&errors, instruction)));
                }
            }
        }
    }

    /// Resolve the model, mode, schema and request shape of one call.
    pub(crate) fn prepare(&self, request: &GenerationRequest) -> GenerationResult<Plan> {
        if request.messages.is_empty() {
            return Err(GenerationError::configuration("request has no messages"));
        }

        let model = select_model(&self.registry, &request.models, request.picking).ok_or_else(
            || GenerationError::NoModelAvailable {
                candidates: request.models.clone(),
            },
        )?;
        let profile = model.profile();

        let mode = request
            .mode
            .unwrap_or(self.config.default_mode)
            .resolve(profile.supports_tools);
        if mode.requires_tools() && !profile.supports_tools {
            return Err(GenerationError::configuration(format!(
                "model '{}' does not support function calling",
                model.identifier()
            )));
        }

        let schema = match &request.thinking {
            Some(thinking) => request.schema.with_thinking(thinking)?,
            None => request.schema.clone(),
        };

        let mut settings = match &request.settings {
            Some(overrides) => self.config.settings.merge(overrides),
            None => self.config.settings.clone(),
        };
        if request.timeout.is_some() {
            settings.timeout = request.timeout;
        }

        let mut messages = request.messages.clone();
        let (declaration, params) = if mode == GenerationMode::Tool {
            let name = self.config.output_function_name.clone();
            let declaration = FunctionDeclaration::new(
                name.clone(),
                request
                    .description
                    .clone()
                    .unwrap_or_else(|| DEFAULT_OUTPUT_DESCRIPTION.to_string()),
            )
            .with_parameters(schema.as_json().clone());
            let params = ModelRequestParameters::new()
                .with_functions(vec![declaration.clone()])
                .with_function_choice(FunctionChoice::Specific(name));
            (Some(declaration), params)
        } else {
            let at = messages.iter().take_while(|m| m.is_system()).count();
            messages.insert(
                at,
                ModelMessage::system(profile.json_instruction(schema.as_json())),
            );
            let params = ModelRequestParameters::new().with_json_mode(profile.supports_native_json);
            (None, params)
        };

        debug!(model = %model.identifier(), %mode, "prepared generation");
        Ok(Plan {
            model,
            mode,
            schema,
            has_thinking: request.thinking.is_some(),
            declaration,
            messages,
            settings,
            params,
        })
    }

    /// Resolve the follow-up model and fit the request shape to its profile.
    fn prepare_feedback(
        &self,
        plan: &Plan,
        id: &str,
    ) -> GenerationResult<(BoxedModel, ModelRequestParameters)> {
        let model = self.registry.resolve(id).map_err(|e| {
            GenerationError::configuration(format!("feedback model '{id}': {e}"))
        })?;
        let profile = model.profile();
        if plan.mode.requires_tools() && !profile.supports_tools {
            return Err(GenerationError::configuration(format!(
                "feedback model '{id}' does not support function calling"
            )));
        }
        let params = if plan.declaration.is_some() {
            plan.params.clone()
        } else {
            plan.params.clone().with_json_mode(profile.supports_native_json)
        };
        Ok((model, params))
    }

    async fn call_model(
        &self,
        model: &BoxedModel,
        messages: &[ModelMessage],
        settings: &ModelSettings,
        params: &ModelRequestParameters,
    ) -> GenerationResult<ModelResponse> {
        let model: &dyn Model = model.as_ref();
        let response = with_retry(&self.config.retry, move || {
            request_once(model, messages, settings, params)
        })
        .await?;
        Ok(response)
    }
}

/// One bounded round trip.
async fn request_once(
    model: &dyn Model,
    messages: &[ModelMessage],
    settings: &ModelSettings,
    params: &ModelRequestParameters,
) -> Result<ModelResponse, ModelError> {
    match settings.timeout {
        Some(limit) => tokio::time::timeout(limit, model.request(messages, settings, params))
            .await
            .map_err(|_| ModelError::Timeout(limit))?,
        None => model.request(messages, settings, params).await,
    }
}

/// Outcome of checking one response.
#[derive(Debug)]
pub(crate) enum Evaluation {
    /// A choice produced a valid object.
    Valid {
        value: JsonValue,
        response: ModelResponse,
    },
    /// No choice did; `output` is the first choice's answer text.
    Invalid {
        output: String,
        errors: Vec<ValidationError>,
    },
    /// The response carried nothing at all.
    Empty,
}

/// Everything fixed for the duration of one call.
#[derive(Clone)]
pub(crate) struct Plan {
    pub(crate) model: BoxedModel,
    pub(crate) mode: GenerationMode,
    pub(crate) schema: Schema,
    pub(crate) has_thinking: bool,
    pub(crate) declaration: Option<FunctionDeclaration>,
    pub(crate) messages: Vec<ModelMessage>,
    pub(crate) settings: ModelSettings,
    pub(crate) params: ModelRequestParameters,
}

impl Plan {
    /// Check a response; the first valid choice wins.
    pub(crate) fn evaluate(&self, response: ModelResponse) -> Evaluation {
        let blank = response.choices.iter().all(|c| {
            c.function_call().is_none() && c.content().map_or(true, |t| t.trim().is_empty())
        });
        if blank {
            return Evaluation::Empty;
        }

        let output = response
            .choices
            .first()
            .map(|c| match c.function_call() {
                Some(call) => call.arguments.raw.clone(),
                None => c.content().unwrap_or_default().to_string(),
            })
            .unwrap_or_default();

        let (response, checks) = match &self.declaration {
            Some(declaration) => self.check_tool_choices(response, declaration),
            None => {
                let checks = response
                    .choices
                    .iter()
                    .map(|c| match c.content() {
                        Some(text) => self.check_text(text),
                        None => Err(vec![ValidationError::root("answer has no text content")]),
                    })
                    .collect();
                (response, checks)
            }
        };

        let mut first_errors = None;
        for check in checks {
            match check {
                Ok(value) => return Evaluation::Valid { value, response },
                Err(errors) => {
                    first_errors.get_or_insert(errors);
                }
            }
        }
        Evaluation::Invalid {
            output,
            errors: first_errors.unwrap_or_default(),
        }
    }

    /// Filter the response, then read each choice in original order.
    fn check_tool_choices(
        &self,
        mut response: ModelResponse,
        declaration: &FunctionDeclaration,
    ) -> (ModelResponse, Vec<Result<JsonValue, Vec<ValidationError>>>) {
        // choices are keyed by position while filtering; provider indices may repeat
        let original: Vec<_> = response
            .choices
            .iter_mut()
            .zip(0u32..)
            .map(|(c, position)| {
                let index = std::mem::replace(&mut c.index, position);
                (index, c.content().map(str::to_string))
            })
            .collect();
        let mut report =
            validate_response_with_report(response, std::slice::from_ref(declaration));

        let checks = original
            .iter()
            .zip(0u32..)
            .map(|((_, content), position)| {
                if let Some(rejected) = report.rejections.iter().find(|r| r.index == position) {
                    return Err(rejection_errors(&rejected.reason));
                }
                let kept = report.response.choices.iter().find(|c| c.index == position);
                match kept.and_then(|c| c.function_call()) {
                    Some(call) => call.arguments.value().cloned().ok_or_else(|| {
                        vec![ValidationError::root("function call has no arguments")]
                    }),
                    // the model answered in text despite the forced call
                    None => match content {
                        Some(text) => self.check_text(text),
                        None => Err(vec![ValidationError::root(format!(
                            "the answer did not call '{}'",
                            declaration.name
                        ))]),
                    },
                }
            })
            .collect();
        for choice in &mut report.response.choices {
            if let Some((index, _)) = original.get(choice.index as usize) {
                choice.index = *index;
            }
        }
        (report.response, checks)
    }

    /// Read a JSON object out of answer text and validate it.
    fn check_text(&self, text: &str) -> Result<JsonValue, Vec<ValidationError>> {
        let arguments = match extract_json_from_text(text) {
            Ok(json) => parse_arguments(&json),
            Err(_) => parse_arguments(text),
        };
        let Some(value) = arguments.value().cloned() else {
            return Err(vec![ValidationError::root(format!(
                "answer is not valid JSON: {}",
                arguments.parse_errors.join("; ")
            ))]);
        };
        self.schema.validate(&value).into_result().map(|()| value)
    }

    /// Assemble the result, splitting off the thinking object.
    pub(crate) fn finish(
        &self,
        mut value: JsonValue,
        response: ModelResponse,
        model: String,
        attempts: u32,
        usage: RequestUsage,
    ) -> GenObjectResult<JsonValue> {
        let mut thinking = None;
        if self.has_thinking {
            if let Some(wrapper) = value.as_object_mut() {
                thinking = wrapper.remove("thinking");
                value = wrapper.remove("output").unwrap_or(JsonValue::Null);
            }
        }
        GenObjectResult {
            object: value.clone(),
            value,
            thinking,
            response,
            model,
            attempts,
            usage,
        }
    }
}

fn rejection_errors(reason: &ChoiceRejection) -> Vec<ValidationError> {
    match reason {
        ChoiceRejection::SchemaValidationFailure { errors, .. } => errors.clone(),
        ChoiceRejection::MissingArguments { parse_errors, .. } => {
            let mut errors = vec![ValidationError::root(reason.to_string())];
            errors.extend(parse_errors.iter().map(ValidationError::root));
            errors
        }
        other => vec![ValidationError::root(other.to_string())],
    }
}
