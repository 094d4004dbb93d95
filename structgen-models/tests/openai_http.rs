//! HTTP round trips against a local mock server.

use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use structgen_core::{FunctionDeclaration, ModelMessage, ModelSettings};
use structgen_models::{
    FunctionChoice, Model, ModelError, ModelRequestParameters, OpenAIChatModel,
    ResponseAccumulator,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn model(server: &MockServer) -> OpenAIChatModel {
    OpenAIChatModel::new("gpt-4o-mini", "sk-test").with_base_url(format!("{}/v1", server.uri()))
}

fn params() -> ModelRequestParameters {
    ModelRequestParameters::new()
        .with_functions(vec![FunctionDeclaration::new("output", "Return the result")
            .with_parameters(json!({
                "type": "object",
                "properties": {"city": {"type": "string"}},
                "required": ["city"]
            }))])
        .with_function_choice(FunctionChoice::Specific("output".into()))
}

#[tokio::test]
async fn test_tool_call_round_trip() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "n": 2,
            "tool_choice": {"type": "function", "function": {"name": "output"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-42",
            "model": "gpt-4o-mini",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": null, "tool_calls": [
                    {"id": "a", "type": "function", "function": {"name": "output", "arguments": "{\"city\": \"Oslo\"}"}}
                ]}, "finish_reason": "tool_calls"},
                {"index": 1, "message": {"role": "assistant", "content": null, "tool_calls": [
                    {"id": "b", "type": "function", "function": {"name": "output", "arguments": "{city: 'Bergen',}"}}
                ]}, "finish_reason": "tool_calls"}
            ],
            "usage": {"prompt_tokens": 20, "completion_tokens": 12, "total_tokens": 32}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = model(&server)
        .request(
            &[ModelMessage::user("Where?")],
            &ModelSettings::new().n(2),
            &params(),
        )
        .await
        .unwrap();

    assert_eq!(response.choices.len(), 2);
    let first = response.choices[0].function_call().unwrap();
    assert_eq!(first.arguments.value(), Some(&json!({"city": "Oslo"})));
    // repaired, with a note in parse_errors
    let second = response.choices[1].function_call().unwrap();
    assert_eq!(second.arguments.value(), Some(&json!({"city": "Bergen"})));
    assert_eq!(second.arguments.parse_errors.len(), 1);
    assert_eq!(response.usage.unwrap().total(), 32);
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "3")
                .set_body_json(json!({"error": {"message": "slow down", "code": "rate_limit"}})),
        )
        .mount(&server)
        .await;

    let err = model(&server)
        .request(&[ModelMessage::user("hi")], &ModelSettings::default(), &params())
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
}

#[tokio::test]
async fn test_auth_error_is_not_retryable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(
            json!({"error": {"message": "Incorrect API key provided", "code": "invalid_api_key"}}),
        ))
        .mount(&server)
        .await;

    let err = model(&server)
        .request(&[ModelMessage::user("hi")], &ModelSettings::default(), &params())
        .await
        .unwrap_err();

    assert!(matches!(err, ModelError::Authentication(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_request_timeout() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let err = model(&server)
        .request(
            &[ModelMessage::user("hi")],
            &ModelSettings::new().timeout(Duration::from_millis(100)),
            &params(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ModelError::Timeout(d) if d == Duration::from_millis(100)));
}

#[tokio::test]
async fn test_streamed_tool_call() {
    let server = MockServer::start().await;

    let sse = concat!(
        "data: {\"model\":\"gpt-4o-mini\",\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"a\",\"function\":{\"name\":\"output\",\"arguments\":\"\"}}]}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{\\\"city\\\": \"}}]}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"\\\"Oslo\\\"}\"}}]},\"finish_reason\":\"tool_calls\"}]}\n\n",
        "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":4,\"completion_tokens\":6,\"total_tokens\":10}}\n\n",
        "data: [DONE]\n\n",
    );

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true, "stream_options": {"include_usage": true}})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
        .mount(&server)
        .await;

    let mut stream = model(&server)
        .request_stream(&[ModelMessage::user("hi")], &ModelSettings::default(), &params())
        .await
        .unwrap();

    let mut acc = ResponseAccumulator::new();
    let mut partials = Vec::new();
    while let Some(delta) = stream.next().await {
        acc.push(&delta.unwrap());
        if let Some(text) = acc.current_text(0) {
            partials.push(text.to_string());
        }
    }

    assert_eq!(partials.last().map(String::as_str), Some("{\"city\": \"Oslo\"}"));
    let response = acc.finish();
    let call = response.choices[0].function_call().unwrap();
    assert_eq!(call.arguments.value(), Some(&json!({"city": "Oslo"})));
    assert_eq!(response.usage.unwrap().total(), 10);
}
