//! End-to-end generation against test models.

use pretty_assertions::assert_eq;
use rstest::rstest;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use structgen::core::{Choice, FunctionCall, MessageRole, ModelResponse, RequestUsage};
use structgen::models::{FunctionModel, MockModel, ModelProfile};
use structgen::output::parse_arguments;
use structgen::prelude::*;
use structgen::{ModelError, DEFAULT_FEEDBACK_PROMPT};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("structgen=debug")
        .with_test_writer()
        .try_init();
}

fn schema() -> Schema {
    Schema::new(json!({
        "type": "object",
        "properties": {
            "name": {"type": "string"},
            "age": {"type": "integer", "minimum": 0}
        },
        "required": ["name", "age"]
    }))
    .unwrap()
}

fn request(model: &str) -> GenerationRequest {
    GenerationRequest::new(schema())
        .model(model)
        .prompt("Invent a person.")
}

fn generator(registry: ModelRegistry) -> Generator {
    Generator::new(registry)
        .with_config(GeneratorConfig::new().retry(RetryConfig::new().fixed(Duration::from_millis(10))))
}

fn call_response(raw: &str) -> ModelResponse {
    ModelResponse::function_call(FunctionCall::new("output", parse_arguments(raw)))
}

#[derive(Debug, Deserialize, PartialEq)]
struct Person {
    name: String,
    age: u32,
}

#[tokio::test]
async fn test_gen_object_typed() {
    init_tracing();
    let model = MockModel::new("m").with_function_call("output", r#"{"name": "Ada", "age": 36}"#);
    let gen = generator(ModelRegistry::new().with_model(model.clone()));

    let result = gen.gen_object::<Person>(request("mock:m")).await.unwrap();
    assert_eq!(
        result.object,
        Person {
            name: "Ada".into(),
            age: 36
        }
    );
    assert_eq!(result.value, json!({"name": "Ada", "age": 36}));
    assert_eq!(result.model, "mock:m");
    assert_eq!(result.attempts, 1);
    assert!(result.thinking.is_none());
    assert_eq!(model.request_count(), 1);
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(3)]
#[tokio::test]
async fn test_feedback_budget_bounds_calls(#[case] loops: u32) {
    init_tracing();
    // answers plain text forever, which never validates
    let model = MockModel::new("m");
    let gen = generator(ModelRegistry::new().with_model(model.clone()));

    let err = gen
        .gen_value(request("mock:m").max_feedback_loops(loops))
        .await
        .unwrap_err();

    match err {
        GenerationError::InvalidGeneration { attempts, errors } => {
            assert_eq!(attempts, loops + 1);
            assert!(!errors.is_empty());
        }
        other => panic!("expected an invalid generation, got {other:?}"),
    }
    assert_eq!(model.request_count(), loops as usize + 1);
}

#[tokio::test]
async fn test_feedback_corrects_answer() {
    init_tracing();
    let model = MockModel::new("m")
        .with_function_call("output", r#"{"name": "Ada", "age": -3}"#)
        .with_function_call("output", r#"{"name": "Ada", "age": 3}"#);
    let gen = generator(ModelRegistry::new().with_model(model.clone()));

    let result = gen
        .gen_value(request("mock:m").max_feedback_loops(2))
        .await
        .unwrap();
    assert_eq!(result.object, json!({"name": "Ada", "age": 3}));
    assert_eq!(result.attempts, 2);

    let follow_up = &model.recorded_requests()[1].messages;
    assert_eq!(follow_up.len(), 3);
    assert_eq!(follow_up[0].content, "Invent a person.");
    assert_eq!(follow_up[1].role, MessageRole::Assistant);
    assert_eq!(follow_up[1].content, r#"{"name": "Ada", "age": -3}"#);
    assert_eq!(follow_up[2].role, MessageRole::User);
    assert!(follow_up[2].content.contains("/age"));
    assert!(follow_up[2].content.ends_with(DEFAULT_FEEDBACK_PROMPT));
}

#[tokio::test]
async fn test_feedback_prompt_override() {
    let model = MockModel::new("m")
        .with_function_call("output", "{}")
        .with_function_call("output", r#"{"name": "Bo", "age": 1}"#);
    let gen = generator(ModelRegistry::new().with_model(model.clone()));

    gen.gen_value(
        request("mock:m")
            .max_feedback_loops(1)
            .feedback_prompt("Please repair it."),
    )
    .await
    .unwrap();

    let follow_up = &model.recorded_requests()[1].messages;
    assert!(follow_up[2].content.ends_with("Please repair it."));
}

#[tokio::test]
async fn test_feedback_model_handles_follow_ups() {
    init_tracing();
    let primary = MockModel::new("primary").with_function_call("output", r#"{"name": 1}"#);
    let fixer = MockModel::new("fixer").with_function_call("output", r#"{"name": "Cy", "age": 9}"#);
    let gen = generator(
        ModelRegistry::new()
            .with_model(primary.clone())
            .with_model(fixer.clone()),
    );

    let result = gen
        .gen_value(
            request("mock:primary")
                .max_feedback_loops(1)
                .feedback_model("mock:fixer"),
        )
        .await
        .unwrap();

    assert_eq!(result.model, "mock:fixer");
    assert_eq!(primary.request_count(), 1);
    assert_eq!(fixer.request_count(), 1);
}

#[tokio::test]
async fn test_unknown_feedback_model_is_configuration_error() {
    let gen = generator(ModelRegistry::new().with_model(MockModel::new("m")));
    let err = gen
        .gen_value(request("mock:m").feedback_model("mock:missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Configuration(_)));
}

#[tokio::test]
async fn test_usage_summed_over_attempts() {
    let model = MockModel::new("m")
        .with_response(call_response("{}").with_usage(RequestUsage::with_tokens(10, 5)))
        .with_response(
            call_response(r#"{"name": "Di", "age": 4}"#).with_usage(RequestUsage::with_tokens(12, 3)),
        );
    let gen = generator(ModelRegistry::new().with_model(model));

    let result = gen
        .gen_value(request("mock:m").max_feedback_loops(1))
        .await
        .unwrap();
    assert_eq!(result.usage.total(), 30);
}

#[tokio::test]
async fn test_thinking_is_returned_separately() {
    let model = MockModel::new("m").with_function_call(
        "output",
        r#"{"thinking": {"steps": ["pick a name"]}, "output": {"name": "Ed", "age": 50}}"#,
    );
    let gen = generator(ModelRegistry::new().with_model(model.clone()));
    let thinking = Schema::new(json!({
        "type": "object",
        "properties": {"steps": {"type": "array", "items": {"type": "string"}}},
        "required": ["steps"]
    }))
    .unwrap();

    let result = gen
        .gen_object::<Person>(request("mock:m").thinking(thinking))
        .await
        .unwrap();

    assert_eq!(result.object.name, "Ed");
    assert_eq!(result.value, json!({"name": "Ed", "age": 50}));
    assert_eq!(result.thinking, Some(json!({"steps": ["pick a name"]})));

    let declared = &model.recorded_requests()[0].params.functions[0].parameters;
    assert_eq!(declared["required"], json!(["thinking", "output"]));
}

#[tokio::test]
async fn test_unresolved_choice_is_dropped() {
    let response = ModelResponse::new(vec![
        Choice::function(0, FunctionCall::new("foo", parse_arguments(r#"{"name": "X", "age": 1}"#))),
        Choice::function(1, FunctionCall::new("output", parse_arguments(r#"{"name": "Y", "age": 2}"#))),
    ]);
    let model = MockModel::new("m").with_response(response);
    let gen = generator(ModelRegistry::new().with_model(model));

    let result = gen.gen_value(request("mock:m")).await.unwrap();
    assert_eq!(result.object, json!({"name": "Y", "age": 2}));
    assert_eq!(result.response.choices.len(), 1);
    assert_eq!(result.response.choices[0].index, 1);
}

#[tokio::test]
async fn test_malformed_arguments_do_not_abort() {
    let model = MockModel::new("m")
        .with_function_call("output", "{{{{ not json at all")
        .with_function_call("output", r#"{name: 'Fay', age: 7,}"#);
    let gen = generator(ModelRegistry::new().with_model(model));

    let result = gen
        .gen_value(request("mock:m").max_feedback_loops(1))
        .await
        .unwrap();
    // the second answer is repaired before validation
    assert_eq!(result.object, json!({"name": "Fay", "age": 7}));
    assert_eq!(result.attempts, 2);
}

#[tokio::test]
async fn test_json_mode_without_tool_support() {
    let model = MockModel::new("m")
        .with_profile(ModelProfile::new().with_tools(false))
        .with_text_response("Sure:\n```json\n{\"name\": \"Gus\", \"age\": 12}\n```");
    let gen = generator(ModelRegistry::new().with_model(model.clone()));

    let result = gen.gen_value(request("mock:m")).await.unwrap();
    assert_eq!(result.object, json!({"name": "Gus", "age": 12}));

    let sent = &model.recorded_requests()[0];
    assert!(sent.params.functions.is_empty());
    assert_eq!(sent.messages[0].role, MessageRole::System);
    assert!(sent.messages[0].content.contains("\"age\""));
}

#[tokio::test]
async fn test_empty_response() {
    let model = MockModel::new("m").with_response(ModelResponse::new(vec![]));
    let gen = generator(ModelRegistry::new().with_model(model));

    let err = gen
        .gen_value(request("mock:m").max_feedback_loops(3))
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::EmptyResult { ref model } if model == "mock:m"));
    assert!(!err.is_degraded());
}

#[tokio::test]
async fn test_no_model_available() {
    let gen = generator(ModelRegistry::new());
    let err = gen
        .gen_value(request("mock:nope").model("unknown:thing"))
        .await
        .unwrap_err();
    match err {
        GenerationError::NoModelAvailable { candidates } => {
            assert_eq!(candidates, vec!["mock:nope".to_string(), "unknown:thing".to_string()]);
        }
        other => panic!("expected no model, got {other:?}"),
    }
}

#[tokio::test]
async fn test_picking_by_quality() {
    let fast = MockModel::new("fast").with_profile(ModelProfile::new().with_ranks(5, 1));
    let smart = MockModel::new("smart")
        .with_profile(ModelProfile::new().with_ranks(1, 5))
        .with_function_call("output", r#"{"name": "Hal", "age": 9000}"#);
    let gen = generator(ModelRegistry::new().with_model(fast.clone()).with_model(smart));

    let result = gen
        .gen_value(
            GenerationRequest::new(schema())
                .models(["mock:fast", "mock:smart"])
                .picking(ModelPicking::Quality)
                .prompt("Invent a computer."),
        )
        .await
        .unwrap();
    assert_eq!(result.model, "mock:smart");
    assert_eq!(fast.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_transport_errors_are_retried() {
    let model = MockModel::new("m")
        .with_error(|| ModelError::http(503, "overloaded"))
        .with_function_call("output", r#"{"name": "Ida", "age": 2}"#);
    let gen = generator(ModelRegistry::new().with_model(model.clone()));

    let result = gen.gen_value(request("mock:m")).await.unwrap();
    // transport retries do not count as generation attempts
    assert_eq!(result.attempts, 1);
    assert_eq!(model.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_transport_failure_after_retries() {
    let model = MockModel::new("m")
        .with_error(|| ModelError::http(500, "a"))
        .with_error(|| ModelError::http(500, "b"))
        .with_error(|| ModelError::http(500, "c"));
    let gen = generator(ModelRegistry::new().with_model(model.clone()));

    let err = gen.gen_value(request("mock:m")).await.unwrap_err();
    assert!(matches!(err, GenerationError::Transport(ModelError::Http { status: 500, .. })));
    assert!(err.is_degraded());
    assert_eq!(model.request_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_retried_then_reported() {
    let model = FunctionModel::function_call("output", json!({"name": "Jo", "age": 1}))
        .with_name("slow")
        .with_latency(Duration::from_secs(10));
    let gen = generator(ModelRegistry::new().with_model(model.clone()));

    let err = gen
        .gen_value(request("function:slow").timeout(Duration::from_secs(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Transport(ModelError::Timeout(d)) if d == Duration::from_secs(1)));
    assert_eq!(model.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation() {
    let model = FunctionModel::function_call("output", json!({"name": "Kai", "age": 1}))
        .with_name("slow")
        .with_latency(Duration::from_secs(60));
    let gen = generator(ModelRegistry::new().with_model(model));
    let token = CancellationToken::new();

    let cancel = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
    });

    let err = gen
        .gen_value(request("function:slow").with_cancellation(token))
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Cancelled));
}
