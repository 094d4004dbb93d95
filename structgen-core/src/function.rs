//! Function declarations offered to a model.
//!
//! A declaration describes a named capability with a JSON Schema for its
//! parameters. The model may answer with a function call that references one
//! of the declared names; any other name is rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A function the model may call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionDeclaration {
    /// Function name (must be a valid identifier for most providers).
    pub name: String,

    /// Human-readable description of what the function does.
    pub description: String,

    /// JSON Schema for the function's parameters.
    pub parameters: JsonValue,

    /// Whether to request strict schema adherence (OpenAI feature).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

impl FunctionDeclaration {
    /// Create a new declaration with an empty object schema.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
            strict: None,
        }
    }

    /// Set the parameters schema.
    #[must_use]
    pub fn with_parameters(mut self, schema: impl Into<JsonValue>) -> Self {
        self.parameters = schema.into();
        self
    }

    /// Set strict mode.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    /// Get the function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the parameters schema.
    #[must_use]
    pub fn parameters(&self) -> &JsonValue {
        &self.parameters
    }

    /// Check if strict mode is enabled.
    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict.unwrap_or(false)
    }

    /// Convert to OpenAI tool format.
    #[must_use]
    pub fn to_openai_tool(&self) -> JsonValue {
        let mut func = serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters.clone()
            }
        });

        if let Some(strict) = self.strict {
            func["function"]["strict"] = JsonValue::Bool(strict);
        }

        func
    }
}
