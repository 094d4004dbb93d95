//! Incremental response pieces and their accumulation.

use std::collections::BTreeMap;
use structgen_core::{
    AssistantMessage, Choice, FinishReason, FunctionCall, ModelResponse, RequestUsage,
};
use structgen_output::parse_arguments;

/// One streamed piece of a response, addressed to a single choice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseDelta {
    /// Choice the piece belongs to.
    pub choice: u32,
    /// Text content to append.
    pub content: Option<String>,
    /// Function name, usually sent once.
    pub function_name: Option<String>,
    /// Provider call id.
    pub function_id: Option<String>,
    /// Argument text to append.
    pub arguments: Option<String>,
    /// Set on the final piece of a choice.
    pub finish_reason: Option<FinishReason>,
    /// Usage for the whole response, usually on the last piece.
    pub usage: Option<RequestUsage>,
    /// Model that produced the response.
    pub model_name: Option<String>,
}

impl ResponseDelta {
    /// A text piece.
    pub fn text(choice: u32, content: impl Into<String>) -> Self {
        Self {
            choice,
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// An argument piece.
    pub fn arguments(choice: u32, arguments: impl Into<String>) -> Self {
        Self {
            choice,
            arguments: Some(arguments.into()),
            ..Self::default()
        }
    }

    /// Split a complete response into one delta per choice.
    #[must_use]
    pub fn from_response(response: &ModelResponse) -> Vec<ResponseDelta> {
        let last = response.choices.len().saturating_sub(1);
        response
            .choices
            .iter()
            .enumerate()
            .map(|(pos, choice)| {
                let call = choice.function_call();
                ResponseDelta {
                    choice: choice.index,
                    content: choice.message.content.clone(),
                    function_name: call.map(|c| c.name.clone()),
                    function_id: call.and_then(|c| c.id.clone()),
                    arguments: call.map(|c| c.arguments.raw.clone()),
                    finish_reason: choice.finish_reason,
                    usage: (pos == last).then(|| response.usage.clone()).flatten(),
                    model_name: response.model_name.clone(),
                }
            })
            .collect()
    }
}

#[derive(Debug, Default)]
struct ChoiceState {
    content: Option<String>,
    function_name: Option<String>,
    function_id: Option<String>,
    arguments: Option<String>,
    finish_reason: Option<FinishReason>,
}

/// Builds a [`ModelResponse`] out of [`ResponseDelta`]s.
#[derive(Debug, Default)]
pub struct ResponseAccumulator {
    choices: BTreeMap<u32, ChoiceState>,
    usage: Option<RequestUsage>,
    model_name: Option<String>,
}

impl ResponseAccumulator {
    /// Empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one delta.
    pub fn push(&mut self, delta: &ResponseDelta) {
        let state = self.choices.entry(delta.choice).or_default();
        if let Some(content) = &delta.content {
            state.content.get_or_insert_with(String::new).push_str(content);
        }
        if let Some(name) = &delta.function_name {
            state.function_name = Some(name.clone());
        }
        if let Some(id) = &delta.function_id {
            state.function_id = Some(id.clone());
        }
        if let Some(arguments) = &delta.arguments {
            state.arguments.get_or_insert_with(String::new).push_str(arguments);
        }
        if delta.finish_reason.is_some() {
            state.finish_reason = delta.finish_reason;
        }
        if let Some(usage) = &delta.usage {
            self.usage.get_or_insert_with(RequestUsage::new).merge(usage);
        }
        if delta.model_name.is_some() {
            self.model_name.clone_from(&delta.model_name);
        }
    }

    /// Text received so far for a choice: argument text for a function
    /// call, content otherwise.
    #[must_use]
    pub fn current_text(&self, choice: u32) -> Option<&str> {
        let state = self.choices.get(&choice)?;
        state
            .arguments
            .as_deref()
            .or(state.content.as_deref())
    }

    /// Finish into a response; argument text is parsed here.
    #[must_use]
    pub fn finish(self) -> ModelResponse {
        let choices = self
            .choices
            .into_iter()
            .map(|(index, state)| {
                let function_call = match (state.function_name, state.arguments) {
                    (None, None) => None,
                    (name, arguments) => {
                        let call = FunctionCall::new(
                            name.unwrap_or_default(),
                            parse_arguments(arguments.as_deref().unwrap_or_default()),
                        );
                        Some(match state.function_id {
                            Some(id) => call.with_id(id),
                            None => call,
                        })
                    }
                };
                Choice {
                    index,
                    message: AssistantMessage {
                        content: state.content,
                        function_call,
                    },
                    finish_reason: state.finish_reason,
                }
            })
            .collect();

        let mut response = ModelResponse::new(choices);
        response.usage = self.usage;
        response.model_name = self.model_name;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_accumulates_arguments_per_choice() {
        let mut acc = ResponseAccumulator::new();
        acc.push(&ResponseDelta {
            choice: 0,
            function_name: Some("output".into()),
            function_id: Some("call_1".into()),
            ..ResponseDelta::default()
        });
        acc.push(&ResponseDelta::arguments(0, r#"{"a":"#));
        assert_eq!(acc.current_text(0), Some(r#"{"a":"#));
        acc.push(&ResponseDelta::text(1, "hello "));
        acc.push(&ResponseDelta::arguments(0, "1}"));
        acc.push(&ResponseDelta::text(1, "world"));
        acc.push(&ResponseDelta {
            choice: 1,
            finish_reason: Some(FinishReason::Stop),
            usage: Some(RequestUsage::with_tokens(3, 4)),
            ..ResponseDelta::default()
        });

        let response = acc.finish();
        assert_eq!(response.choices.len(), 2);

        let call = response.choices[0].function_call().unwrap();
        assert_eq!(call.name, "output");
        assert_eq!(call.id.as_deref(), Some("call_1"));
        assert_eq!(call.arguments.value(), Some(&json!({"a": 1})));

        assert_eq!(response.choices[1].content(), Some("hello world"));
        assert_eq!(response.choices[1].finish_reason, Some(FinishReason::Stop));
        assert_eq!(response.usage.unwrap().total(), 7);
    }

    #[test]
    fn test_from_response_round_trip() {
        let response = ModelResponse::new(vec![Choice::text(0, "a"), Choice::text(2, "b")])
            .with_usage(RequestUsage::with_tokens(1, 1))
            .with_model_name("mock:x");

        let deltas = ResponseDelta::from_response(&response);
        assert_eq!(deltas.len(), 2);
        assert!(deltas[0].usage.is_none());
        assert!(deltas[1].usage.is_some());

        let mut acc = ResponseAccumulator::new();
        deltas.iter().for_each(|d| acc.push(d));
        let rebuilt = acc.finish();
        assert_eq!(rebuilt.choices, response.choices);
        assert_eq!(rebuilt.usage, response.usage);
        assert_eq!(rebuilt.model_name, response.model_name);
    }
}
