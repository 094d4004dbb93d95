//! Wire types for the OpenAI-compatible chat completions API.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ============================================================================
// Request Types
// ============================================================================

/// Chat completion request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    /// Model to use.
    pub model: String,
    /// Conversation.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Number of choices.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    /// Stop sequences.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// Sampling seed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Tool definitions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ChatTool>>,
    /// Tool choice strategy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoiceValue>,
    /// Whether to allow parallel tool calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
    /// Response format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    /// Whether to stream the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Stream options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
}

/// Chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the author.
    pub role: String,
    /// Text content.
    pub content: String,
}

impl ChatMessage {
    /// Create a message.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Tool definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTool {
    /// Tool type, always `function`.
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function definition.
    pub function: FunctionDefinition,
}

/// Function definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Function name.
    pub name: String,
    /// Function description.
    pub description: String,
    /// Parameter schema.
    pub parameters: JsonValue,
    /// Strict schema adherence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

/// Tool choice value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolChoiceValue {
    /// `auto`, `none` or `required`.
    Mode(String),
    /// A specific function.
    Specific {
        /// Tool type.
        #[serde(rename = "type")]
        tool_type: String,
        /// Function to call.
        function: FunctionName,
    },
}

impl ToolChoiceValue {
    /// A named mode.
    pub fn mode(mode: &str) -> Self {
        Self::Mode(mode.to_string())
    }

    /// A specific function.
    pub fn function(name: impl Into<String>) -> Self {
        Self::Specific {
            tool_type: "function".to_string(),
            function: FunctionName { name: name.into() },
        }
    }
}

/// Function name for tool choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionName {
    /// The function name.
    pub name: String,
}

/// Response format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFormat {
    /// `text` or `json_object`.
    #[serde(rename = "type")]
    pub format_type: String,
}

impl ResponseFormat {
    /// JSON object format.
    pub fn json_object() -> Self {
        Self {
            format_type: "json_object".to_string(),
        }
    }
}

/// Stream options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamOptions {
    /// Include usage in the final chunk.
    pub include_usage: bool,
}

// ============================================================================
// Response Types
// ============================================================================

/// Chat completion response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    /// Response id.
    #[serde(default)]
    pub id: Option<String>,
    /// Model used.
    #[serde(default)]
    pub model: Option<String>,
    /// Choices.
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    /// Token usage.
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// Chat choice.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    /// Choice index.
    pub index: u32,
    /// Assistant message.
    pub message: ResponseMessage,
    /// Finish reason.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Assistant message in a response.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    /// Text content.
    #[serde(default)]
    pub content: Option<String>,
    /// Tool calls.
    #[serde(default)]
    pub tool_calls: Option<Vec<ResponseToolCall>>,
    /// Refusal message.
    #[serde(default)]
    pub refusal: Option<String>,
}

/// Tool call in a response.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseToolCall {
    /// Call id.
    #[serde(default)]
    pub id: Option<String>,
    /// Function details.
    pub function: ResponseFunction,
}

/// Function details of a tool call.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseFunction {
    /// Function name.
    #[serde(default)]
    pub name: String,
    /// Raw JSON argument text.
    #[serde(default)]
    pub arguments: String,
}

/// Token usage.
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    /// Prompt tokens.
    pub prompt_tokens: u64,
    /// Completion tokens.
    pub completion_tokens: u64,
    /// Total tokens.
    pub total_tokens: u64,
}

// ============================================================================
// Streaming Types
// ============================================================================

/// One SSE chunk.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChunk {
    /// Model used.
    #[serde(default)]
    pub model: Option<String>,
    /// Choice deltas.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// Usage, on the last chunk when requested.
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// Delta for one choice.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkChoice {
    /// Choice index.
    pub index: u32,
    /// Delta content.
    #[serde(default)]
    pub delta: ChunkDelta,
    /// Finish reason.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Delta content.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    /// Text content.
    #[serde(default)]
    pub content: Option<String>,
    /// Tool call deltas.
    #[serde(default)]
    pub tool_calls: Option<Vec<ChunkToolCall>>,
}

/// Tool call delta.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkToolCall {
    /// Tool call position.
    #[serde(default)]
    pub index: u32,
    /// Call id, on the first delta.
    #[serde(default)]
    pub id: Option<String>,
    /// Function delta.
    #[serde(default)]
    pub function: Option<ChunkFunction>,
}

/// Function delta.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkFunction {
    /// Name, on the first delta.
    #[serde(default)]
    pub name: Option<String>,
    /// Argument text fragment.
    #[serde(default)]
    pub arguments: Option<String>,
}

// ============================================================================
// Error Types
// ============================================================================

/// Error envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIError {
    /// Error body.
    pub error: OpenAIErrorBody,
}

/// Error body.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIErrorBody {
    /// Message.
    pub message: String,
    /// Code.
    #[serde(default)]
    pub code: Option<String>,
}
