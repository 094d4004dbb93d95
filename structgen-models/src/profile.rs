//! Model profiles: capabilities and ranking hints.

/// Default instruction appended to the conversation in JSON mode.
///
/// `{schema}` is replaced by the pretty-printed schema.
pub const DEFAULT_JSON_INSTRUCTION_TEMPLATE: &str = r#"Respond with a single JSON document matching this JSON Schema:
```json
{schema}
```
Output only valid JSON, no additional text."#;

/// What a model can do, and how it compares to its peers.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelProfile {
    /// Supports function calling.
    pub supports_tools: bool,
    /// Supports a native JSON response format.
    pub supports_native_json: bool,
    /// Supports several choices per request.
    pub supports_multiple_choices: bool,
    /// Supports streaming responses.
    pub supports_streaming: bool,
    /// Relative speed, higher is faster.
    pub speed_rank: u8,
    /// Relative output quality, higher is better.
    pub quality_rank: u8,
    /// Instruction used in JSON mode.
    pub json_instruction_template: String,
}

impl Default for ModelProfile {
    fn default() -> Self {
        Self {
            supports_tools: true,
            supports_native_json: false,
            supports_multiple_choices: false,
            supports_streaming: true,
            speed_rank: 1,
            quality_rank: 1,
            json_instruction_template: DEFAULT_JSON_INSTRUCTION_TEMPLATE.to_string(),
        }
    }
}

impl ModelProfile {
    /// Default profile.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set tool support.
    #[must_use]
    pub fn with_tools(mut self, supported: bool) -> Self {
        self.supports_tools = supported;
        self
    }

    /// Set native JSON support.
    #[must_use]
    pub fn with_native_json(mut self, supported: bool) -> Self {
        self.supports_native_json = supported;
        self
    }

    /// Set ranking hints.
    #[must_use]
    pub fn with_ranks(mut self, speed: u8, quality: u8) -> Self {
        self.speed_rank = speed;
        self.quality_rank = quality;
        self
    }

    /// Set the JSON-mode instruction template.
    #[must_use]
    pub fn with_json_instruction_template(mut self, template: impl Into<String>) -> Self {
        self.json_instruction_template = template.into();
        self
    }

    /// Render the JSON-mode instruction for a schema.
    #[must_use]
    pub fn json_instruction(&self, schema: &serde_json::Value) -> String {
        let rendered = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
        self.json_instruction_template.replace("{schema}", &rendered)
    }
}

/// Profile for an OpenAI chat model, keyed on its name.
#[must_use]
pub fn openai_profile(model_name: &str) -> ModelProfile {
    let base = ModelProfile::default().with_native_json(true);
    let base = ModelProfile {
        supports_multiple_choices: true,
        ..base
    };

    if model_name.starts_with("o1") || model_name.starts_with("o3") || model_name.starts_with("o4") {
        base.with_ranks(1, 5)
    } else if model_name.contains("mini") || model_name.contains("nano") {
        base.with_ranks(4, 2)
    } else if model_name.starts_with("gpt-3.5") {
        base.with_ranks(5, 1)
    } else if model_name.starts_with("gpt-4") || model_name.starts_with("gpt-5") {
        base.with_ranks(3, 4)
    } else {
        base.with_ranks(2, 2)
    }
}
