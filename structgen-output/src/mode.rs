//! Generation mode definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::OutputError;

/// How a structured object is requested from the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Tool mode when the model supports tools, JSON mode otherwise.
    #[default]
    Auto,

    /// Instruct the model in the prompt to answer with a JSON document.
    ///
    /// The text content is extracted, parsed and validated locally. Native
    /// JSON output is requested as well when the model offers it.
    Json,

    /// Declare a single output function whose parameters are the schema
    /// and force the model to call it.
    Tool,
}

impl GenerationMode {
    /// Resolve `Auto` against a model's capabilities.
    #[must_use]
    pub fn resolve(self, supports_tools: bool) -> GenerationMode {
        match self {
            GenerationMode::Auto if supports_tools => GenerationMode::Tool,
            GenerationMode::Auto => GenerationMode::Json,
            other => other,
        }
    }

    /// Whether this mode needs tool support.
    #[must_use]
    pub fn requires_tools(&self) -> bool {
        matches!(self, GenerationMode::Tool)
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationMode::Auto => write!(f, "auto"),
            GenerationMode::Json => write!(f, "json"),
            GenerationMode::Tool => write!(f, "tool"),
        }
    }
}

impl FromStr for GenerationMode {
    type Err = OutputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(GenerationMode::Auto),
            "json" => Ok(GenerationMode::Json),
            "tool" | "tools" | "function" => Ok(GenerationMode::Tool),
            other => Err(OutputError::UnknownMode(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(GenerationMode::Auto, true, GenerationMode::Tool)]
    #[case(GenerationMode::Auto, false, GenerationMode::Json)]
    #[case(GenerationMode::Json, true, GenerationMode::Json)]
    #[case(GenerationMode::Tool, false, GenerationMode::Tool)]
    fn test_resolve(
        #[case] mode: GenerationMode,
        #[case] supports_tools: bool,
        #[case] expected: GenerationMode,
    ) {
        assert_eq!(mode.resolve(supports_tools), expected);
    }

    #[rstest]
    #[case("auto", GenerationMode::Auto)]
    #[case("JSON", GenerationMode::Json)]
    #[case(" tool ", GenerationMode::Tool)]
    fn test_from_str(#[case] input: &str, #[case] expected: GenerationMode) {
        assert_eq!(input.parse::<GenerationMode>().unwrap(), expected);
    }

    #[test]
    fn test_from_str_unknown() {
        assert!("xml".parse::<GenerationMode>().is_err());
    }

    #[test]
    fn test_display_and_default() {
        assert_eq!(GenerationMode::default(), GenerationMode::Auto);
        assert_eq!(GenerationMode::Tool.to_string(), "tool");
        assert_eq!(
            serde_json::to_string(&GenerationMode::Json).unwrap(),
            "\"json\""
        );
    }
}
