//! OpenAI Chat Completions model implementation.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde_json::Value as JsonValue;
use std::time::Duration;
use structgen_core::{
    AssistantMessage, Choice, FinishReason, FunctionCall, FunctionDeclaration, ModelMessage,
    ModelResponse, ModelSettings, RequestUsage,
};
use structgen_output::parse_arguments;
use tracing::{debug, warn};

use super::stream::OpenAIStreamParser;
use super::types::*;
use crate::error::ModelError;
use crate::model::{FunctionChoice, Model, ModelRequestParameters, StreamedResponse};
use crate::profile::{openai_profile, ModelProfile};

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI Chat Completions model.
#[derive(Debug, Clone)]
pub struct OpenAIChatModel {
    model_name: String,
    client: Client,
    api_key: String,
    base_url: String,
    organization: Option<String>,
    profile: ModelProfile,
    default_timeout: Duration,
}

impl OpenAIChatModel {
    /// Create a new OpenAI chat model.
    pub fn new(model_name: impl Into<String>, api_key: impl Into<String>) -> Self {
        let model_name = model_name.into();
        let profile = openai_profile(&model_name);

        Self {
            model_name,
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            organization: None,
            profile,
            default_timeout: Duration::from_secs(120),
        }
    }

    /// Create from `OPENAI_API_KEY`, honouring `OPENAI_BASE_URL` when set.
    pub fn from_env(model_name: impl Into<String>) -> Result<Self, ModelError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            ModelError::configuration("OPENAI_API_KEY environment variable not set")
        })?;
        let model = Self::new(model_name, api_key);
        Ok(match std::env::var("OPENAI_BASE_URL") {
            Ok(url) if !url.trim().is_empty() => model.with_base_url(url),
            _ => model,
        })
    }

    /// Set the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the organization ID.
    #[must_use]
    pub fn with_organization(mut self, org: impl Into<String>) -> Self {
        self.organization = Some(org.into());
        self
    }

    /// Set a custom HTTP client.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Set the default timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Set a custom profile.
    #[must_use]
    pub fn with_profile(mut self, profile: ModelProfile) -> Self {
        self.profile = profile;
        self
    }

    fn convert_messages(messages: &[ModelMessage]) -> Vec<ChatMessage> {
        messages
            .iter()
            .map(|m| ChatMessage::new(m.role.to_string(), m.content.clone()))
            .collect()
    }

    fn convert_functions(functions: &[FunctionDeclaration]) -> Vec<ChatTool> {
        functions
            .iter()
            .map(|f| ChatTool {
                tool_type: "function".to_string(),
                function: FunctionDefinition {
                    name: f.name.clone(),
                    description: f.description.clone(),
                    parameters: f.parameters.clone(),
                    strict: f.strict,
                },
            })
            .collect()
    }

    fn convert_function_choice(choice: &FunctionChoice) -> ToolChoiceValue {
        match choice {
            FunctionChoice::Auto => ToolChoiceValue::mode("auto"),
            FunctionChoice::Required => ToolChoiceValue::mode("required"),
            FunctionChoice::None => ToolChoiceValue::mode("none"),
            FunctionChoice::Specific(name) => ToolChoiceValue::function(name),
        }
    }

    /// Build the request body.
    fn build_request(
        &self,
        messages: &[ModelMessage],
        settings: &ModelSettings,
        params: &ModelRequestParameters,
        stream: bool,
    ) -> ChatCompletionRequest {
        let tools =
            (!params.functions.is_empty()).then(|| Self::convert_functions(&params.functions));
        // tool_choice without tools is rejected by the API
        let tool_choice = tools
            .as_ref()
            .and(params.function_choice.as_ref())
            .map(Self::convert_function_choice);
        let parallel_tool_calls = tools.as_ref().and(settings.parallel_tool_calls);

        ChatCompletionRequest {
            model: self.model_name.clone(),
            messages: Self::convert_messages(messages),
            temperature: settings.temperature,
            top_p: settings.top_p,
            n: settings.n.filter(|n| *n > 1),
            max_tokens: settings.max_tokens,
            stop: settings.stop.clone(),
            seed: settings.seed,
            tools,
            tool_choice,
            parallel_tool_calls,
            response_format: params.json_mode.then(ResponseFormat::json_object),
            stream: stream.then_some(true),
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }

    /// Serialize the body, laying provider-specific `extra` settings on top.
    fn encode_body(
        request: &ChatCompletionRequest,
        settings: &ModelSettings,
    ) -> Result<JsonValue, ModelError> {
        let mut body = serde_json::to_value(request)?;
        if let (Some(JsonValue::Object(extra)), JsonValue::Object(target)) =
            (&settings.extra, &mut body)
        {
            for (key, value) in extra {
                target.insert(key.clone(), value.clone());
            }
        }
        Ok(body)
    }

    /// Parse an OpenAI response into our format.
    fn parse_response(&self, resp: ChatCompletionResponse) -> Result<ModelResponse, ModelError> {
        if resp.choices.is_empty() {
            return Err(ModelError::invalid_response("no choices in response"));
        }

        let total = resp.choices.len();
        let mut refusals = Vec::new();
        let mut choices = Vec::with_capacity(total);

        for choice in resp.choices {
            if let Some(refusal) = choice.message.refusal {
                warn!(choice = choice.index, "model refused to answer");
                refusals.push(refusal);
                continue;
            }

            // one call per choice; extra parallel calls are ignored
            let function_call = choice
                .message
                .tool_calls
                .into_iter()
                .flatten()
                .next()
                .map(|tc| {
                    let call =
                        FunctionCall::new(tc.function.name, parse_arguments(&tc.function.arguments));
                    match tc.id {
                        Some(id) => call.with_id(id),
                        None => call,
                    }
                });

            choices.push(Choice {
                index: choice.index,
                message: AssistantMessage {
                    content: choice.message.content.filter(|c| !c.is_empty()),
                    function_call,
                },
                finish_reason: choice.finish_reason.as_deref().map(FinishReason::from_provider),
            });
        }

        if choices.is_empty() {
            return Err(ModelError::ContentFiltered(refusals.join("; ")));
        }
        debug!(received = total, kept = choices.len(), "parsed chat completion");

        let mut response = ModelResponse::new(choices);
        response.model_name = resp.model.or_else(|| Some(self.model_name.clone()));
        response.vendor_id = resp.id;
        response.usage = resp.usage.map(|u| RequestUsage {
            request_tokens: Some(u.prompt_tokens),
            response_tokens: Some(u.completion_tokens),
            total_tokens: Some(u.total_tokens),
        });
        Ok(response)
    }

    fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
        headers
            .get("retry-after")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64)
    }

    /// Map an unsuccessful API response to an error.
    fn handle_error_response(status: u16, body: &str, headers: &HeaderMap) -> ModelError {
        if status == 429 {
            return ModelError::rate_limited(Self::parse_retry_after(headers));
        }

        let Ok(err) = serde_json::from_str::<OpenAIError>(body) else {
            return match status {
                401 | 403 => ModelError::auth(body),
                _ => ModelError::http(status, body),
            };
        };

        match status {
            401 | 403 => ModelError::auth(err.error.message),
            404 => ModelError::NotFound(err.error.message),
            s if s >= 500 || s == 408 => ModelError::http(s, err.error.message),
            _ => ModelError::Api {
                message: err.error.message,
                code: err.error.code,
            },
        }
    }

    async fn send(
        &self,
        body: &JsonValue,
        settings: &ModelSettings,
    ) -> Result<reqwest::Response, ModelError> {
        let timeout = settings.timeout.unwrap_or(self.default_timeout);

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(timeout);
        if let Some(org) = &self.organization {
            request = request.header("OpenAI-Organization", org);
        }

        let response = request.json(body).send().await.map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout(timeout)
            } else {
                e.into()
            }
        })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::handle_error_response(status, &body, &headers));
        }
        Ok(response)
    }
}

#[async_trait]
impl Model for OpenAIChatModel {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn system(&self) -> &str {
        "openai"
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
        let request = self.build_request(messages, settings, params, false);
        let body = Self::encode_body(&request, settings)?;
        let response = self.send(&body, settings).await?;

        let resp: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ModelError::invalid_response(e.to_string()))?;

        self.parse_response(resp)
    }

    async fn request_stream(
        &self,
        messages: &[ModelMessage],
        settings: &ModelSettings,
        params: &ModelRequestParameters,
    ) -> Result<StreamedResponse, ModelError> {
        let request = self.build_request(messages, settings, params, true);
        let body = Self::encode_body(&request, settings)?;
        let response = self.send(&body, settings).await?;

        Ok(Box::pin(OpenAIStreamParser::new(response.bytes_stream())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use reqwest::header::HeaderValue;
    use serde_json::json;

    fn model() -> OpenAIChatModel {
        OpenAIChatModel::new("gpt-4o-mini", "sk-test")
    }

    fn output_fn() -> FunctionDeclaration {
        FunctionDeclaration::new("output", "Return the result")
            .with_parameters(json!({"type": "object"}))
    }

    #[test]
    fn test_new() {
        let m = model().with_base_url("http://localhost:8080/v1/");
        assert_eq!(m.identifier(), "openai:gpt-4o-mini");
        assert_eq!(m.base_url, "http://localhost:8080/v1");
        assert_eq!(m.profile().speed_rank, 4);
    }

    #[test]
    fn test_build_request_with_functions() {
        let settings = ModelSettings::new().n(3).temperature(0.2).parallel_tool_calls(false);
        let params = ModelRequestParameters::new()
            .with_functions(vec![output_fn()])
            .with_function_choice(FunctionChoice::Specific("output".into()));
        let req = model().build_request(
            &[ModelMessage::system("be terse"), ModelMessage::user("hi")],
            &settings,
            &params,
            false,
        );

        assert_eq!(req.messages[0], ChatMessage::new("system", "be terse"));
        assert_eq!(req.n, Some(3));
        assert_eq!(req.tools.as_ref().map(Vec::len), Some(1));
        assert_eq!(req.tool_choice, Some(ToolChoiceValue::function("output")));
        assert_eq!(req.parallel_tool_calls, Some(false));
        assert!(req.response_format.is_none());
        assert!(req.stream.is_none());
    }

    #[test]
    fn test_build_request_json_mode() {
        let settings = ModelSettings::new().n(1).parallel_tool_calls(true);
        let params = ModelRequestParameters::new()
            .with_json_mode(true)
            .with_function_choice(FunctionChoice::Required);
        let req = model().build_request(&[ModelMessage::user("hi")], &settings, &params, true);

        assert_eq!(req.response_format, Some(ResponseFormat::json_object()));
        assert!(req.tools.is_none());
        assert!(req.tool_choice.is_none());
        assert!(req.parallel_tool_calls.is_none());
        assert!(req.n.is_none());
        assert_eq!(req.stream, Some(true));
    }

    #[test]
    fn test_extra_settings_overlay() {
        let settings = ModelSettings::new().extra(json!({"user": "abc", "temperature": 1.0}));
        let req = model().build_request(&[ModelMessage::user("hi")], &settings, &ModelRequestParameters::new(), false);
        let body = OpenAIChatModel::encode_body(&req, &settings).unwrap();
        assert_eq!(body["user"], "abc");
        assert_eq!(body["temperature"], 1.0);
        assert_eq!(body["model"], "gpt-4o-mini");
    }

    #[test]
    fn test_parse_response_multiple_choices() {
        let resp: ChatCompletionResponse = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-mini",
            "choices": [
                {"index": 0, "message": {"content": null, "tool_calls": [
                    {"id": "c0", "type": "function", "function": {"name": "output", "arguments": "{\"a\":1}"}}
                ]}, "finish_reason": "tool_calls"},
                {"index": 1, "message": {"content": null, "tool_calls": [
                    {"id": "c1", "type": "function", "function": {"name": "output", "arguments": "{oops"}}
                ]}, "finish_reason": "tool_calls"},
                {"index": 2, "message": {"content": "plain"}, "finish_reason": "stop"}
            ],
            "usage": {"prompt_tokens": 7, "completion_tokens": 9, "total_tokens": 16}
        }))
        .unwrap();

        let response = model().parse_response(resp).unwrap();
        assert_eq!(response.choices.len(), 3);
        let first = response.choices[0].function_call().unwrap();
        assert_eq!(first.id.as_deref(), Some("c0"));
        assert_eq!(first.arguments.value(), Some(&json!({"a": 1})));
        assert!(!response.choices[1].function_call().unwrap().arguments.is_parsed());
        assert_eq!(response.choices[2].content(), Some("plain"));
        assert_eq!(response.usage.unwrap().total(), 16);
        assert_eq!(response.vendor_id.as_deref(), Some("chatcmpl-1"));
    }

    #[test]
    fn test_parse_response_refusals() {
        let only_refusal: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{"index": 0, "message": {"content": null, "refusal": "no"}}]
        }))
        .unwrap();
        assert!(matches!(
            model().parse_response(only_refusal),
            Err(ModelError::ContentFiltered(_))
        ));

        let empty: ChatCompletionResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(
            model().parse_response(empty),
            Err(ModelError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_error_mapping() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("2"));
        let body = r#"{"error": {"message": "nope", "code": "bad"}}"#;

        let rate = OpenAIChatModel::handle_error_response(429, "", &headers);
        assert_eq!(rate.retry_after(), Some(Duration::from_secs(2)));
        assert!(matches!(
            OpenAIChatModel::handle_error_response(401, body, &HeaderMap::new()),
            ModelError::Authentication(_)
        ));
        assert!(matches!(
            OpenAIChatModel::handle_error_response(404, body, &HeaderMap::new()),
            ModelError::NotFound(_)
        ));
        assert!(OpenAIChatModel::handle_error_response(502, body, &HeaderMap::new()).is_retryable());
        assert!(matches!(
            OpenAIChatModel::handle_error_response(400, body, &HeaderMap::new()),
            ModelError::Api { code: Some(_), .. }
        ));
        assert!(matches!(
            OpenAIChatModel::handle_error_response(500, "<html>", &HeaderMap::new()),
            ModelError::Http { status: 500, .. }
        ));
    }
}
