//! OpenAI-compatible chat completions.
//!
//! [`OpenAIChatModel`] talks to `/chat/completions` on api.openai.com or any
//! server speaking the same protocol (set `OPENAI_BASE_URL` or call
//! [`OpenAIChatModel::with_base_url`]).
//!
//! ```rust,ignore
//! use structgen_models::openai;
//! use structgen_models::Model;
//!
//! let model = openai::chat("gpt-4o-mini", std::env::var("OPENAI_API_KEY")?);
//! let response = model.request(&messages, &settings, &params).await?;
//! ```

pub mod chat;
pub mod stream;
pub mod types;

pub use chat::{OpenAIChatModel, DEFAULT_BASE_URL};
pub use stream::OpenAIStreamParser;
pub use types::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatTool,
    FunctionDefinition, ResponseFormat, ToolChoiceValue, Usage,
};

/// Create an OpenAI chat model.
pub fn chat(model_name: impl Into<String>, api_key: impl Into<String>) -> OpenAIChatModel {
    OpenAIChatModel::new(model_name, api_key)
}

/// Common OpenAI model names.
pub mod models {
    /// GPT-4o
    pub const GPT_4O: &str = "gpt-4o";
    /// GPT-4o mini
    pub const GPT_4O_MINI: &str = "gpt-4o-mini";
    /// GPT-4.1 nano
    pub const GPT_41_NANO: &str = "gpt-4.1-nano";
    /// GPT-3.5 Turbo
    pub const GPT_35_TURBO: &str = "gpt-3.5-turbo";
    /// o3-mini
    pub const O3_MINI: &str = "o3-mini";
}
