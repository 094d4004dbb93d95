//! Model responses.
//!
//! A [`ModelResponse`] holds a list of independent [`Choice`]s. Each choice is
//! an assistant message that either carries text content or a
//! [`FunctionCall`]. Function-call arguments keep their raw text next to the
//! parse outcome so that a failed parse can still be diagnosed later.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::usage::RequestUsage;

/// Arguments of a function call, as received and as parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionArguments {
    /// The raw argument text, verbatim.
    pub raw: String,
    /// Errors or repair notes recorded while parsing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parse_errors: Vec<String>,
    /// The parsed value, if parsing succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed: Option<JsonValue>,
}

impl FunctionArguments {
    /// Arguments that parsed cleanly.
    pub fn parsed(raw: impl Into<String>, value: JsonValue) -> Self {
        Self {
            raw: raw.into(),
            parse_errors: Vec::new(),
            parsed: Some(value),
        }
    }

    /// Arguments that could not be parsed.
    pub fn unparsed(raw: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            raw: raw.into(),
            parse_errors: errors,
            parsed: None,
        }
    }

    /// Arguments built from an already structured value.
    #[must_use]
    pub fn from_value(value: JsonValue) -> Self {
        Self {
            raw: value.to_string(),
            parse_errors: Vec::new(),
            parsed: Some(value),
        }
    }

    /// Parsed value unless it is absent or JSON `null`.
    #[must_use]
    pub fn value(&self) -> Option<&JsonValue> {
        self.parsed.as_ref().filter(|v| !v.is_null())
    }

    /// Whether parsing produced a usable value.
    #[must_use]
    pub fn is_parsed(&self) -> bool {
        self.value().is_some()
    }
}

/// A function call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the function; may be empty when the provider omitted it.
    pub name: String,
    /// The call arguments.
    pub arguments: FunctionArguments,
    /// Provider-assigned call identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl FunctionCall {
    /// Create a new function call.
    pub fn new(name: impl Into<String>, arguments: FunctionArguments) -> Self {
        Self {
            name: name.into(),
            arguments,
            id: None,
        }
    }

    /// Set the provider call id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Name, if non-empty.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        let name = self.name.trim();
        (!name.is_empty()).then_some(name)
    }
}

/// Assistant message carried by a choice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    /// Text content, absent for pure function calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Function call, if the model chose to call one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of response.
    Stop,
    /// Maximum tokens reached.
    Length,
    /// Content was filtered.
    ContentFilter,
    /// Model wants to call a function.
    ToolCall,
    /// An error occurred.
    Error,
}

impl FinishReason {
    /// Parse a provider finish reason string.
    #[must_use]
    pub fn from_provider(reason: &str) -> Self {
        match reason {
            "length" | "max_tokens" => Self::Length,
            "content_filter" => Self::ContentFilter,
            "tool_calls" | "function_call" | "tool_use" => Self::ToolCall,
            "error" => Self::Error,
            _ => Self::Stop,
        }
    }

    /// Check if this indicates truncation.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Length)
    }
}

/// One candidate answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Position of the choice in the provider response.
    pub index: u32,
    /// The assistant message.
    pub message: AssistantMessage,
    /// Why generation stopped for this choice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl Choice {
    /// A plain text choice.
    pub fn text(index: u32, content: impl Into<String>) -> Self {
        Self {
            index,
            message: AssistantMessage {
                content: Some(content.into()),
                function_call: None,
            },
            finish_reason: Some(FinishReason::Stop),
        }
    }

    /// A function-call choice.
    #[must_use]
    pub fn function(index: u32, call: FunctionCall) -> Self {
        Self {
            index,
            message: AssistantMessage {
                content: None,
                function_call: Some(call),
            },
            finish_reason: Some(FinishReason::ToolCall),
        }
    }

    /// Text content of the choice.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.message.content.as_deref()
    }

    /// Function call of the choice.
    #[must_use]
    pub fn function_call(&self) -> Option<&FunctionCall> {
        self.message.function_call.as_ref()
    }
}

/// A complete response from a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Candidate answers.
    pub choices: Vec<Choice>,
    /// Model that produced the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    /// Token usage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<RequestUsage>,
    /// Provider response id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    /// When the response was received.
    pub timestamp: DateTime<Utc>,
}

impl ModelResponse {
    /// Create a response from choices.
    #[must_use]
    pub fn new(choices: Vec<Choice>) -> Self {
        Self {
            choices,
            model_name: None,
            usage: None,
            vendor_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Single text choice response.
    pub fn text(content: impl Into<String>) -> Self {
        Self::new(vec![Choice::text(0, content)])
    }

    /// Single function-call choice response.
    #[must_use]
    pub fn function_call(call: FunctionCall) -> Self {
        Self::new(vec![Choice::function(0, call)])
    }

    /// Set the model name.
    #[must_use]
    pub fn with_model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = Some(name.into());
        self
    }

    /// Set usage.
    #[must_use]
    pub fn with_usage(mut self, usage: RequestUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Whether no choices remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    /// First choice, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Choice> {
        self.choices.first()
    }

    /// Concatenated text content of the first choice.
    #[must_use]
    pub fn text_content(&self) -> Option<&str> {
        self.first().and_then(Choice::content)
    }
}
