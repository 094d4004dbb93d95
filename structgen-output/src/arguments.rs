//! Function-call argument parsing.
//!
//! [`parse_arguments`] turns the raw argument text of a function call into
//! [`FunctionArguments`]. It never fails and never panics: the raw text is
//! kept verbatim, and every problem is recorded in `parse_errors`.

use serde_json::Value as JsonValue;
use structgen_core::FunctionArguments;

use crate::repair::repair_json;

/// Parse raw function-call arguments.
///
/// A strict parse is tried first. If it fails, a conservative repair pass is
/// attempted; a successful repair yields a parsed value and a note in
/// `parse_errors` naming the fixes. If both fail, `parsed` is `None` and
/// `parse_errors` holds the strict parse error.
///
/// ```rust
/// use structgen_output::parse_arguments;
///
/// let args = parse_arguments(r#"{"score": 3}"#);
/// assert_eq!(args.value().unwrap()["score"], 3);
///
/// let args = parse_arguments("{score: 3,}");
/// assert!(args.is_parsed());
/// assert_eq!(args.parse_errors.len(), 1);
///
/// let args = parse_arguments("not json at all");
/// assert!(!args.is_parsed());
/// assert_eq!(args.raw, "not json at all");
/// ```
#[must_use]
pub fn parse_arguments(raw: &str) -> FunctionArguments {
    if raw.trim().is_empty() {
        return FunctionArguments::unparsed(raw, vec!["arguments are empty".to_string()]);
    }

    let strict_error = match serde_json::from_str::<JsonValue>(raw) {
        Ok(value) => return FunctionArguments::parsed(raw, value),
        Err(err) => err.to_string(),
    };

    if let Some(repaired) = repair_json(raw).filter(|r| !r.repairs.is_empty()) {
        if let Ok(value) = serde_json::from_str::<JsonValue>(&repaired.text) {
            let labels: Vec<&str> = repaired.repairs.iter().map(|r| r.label()).collect();
            tracing::debug!(repairs = ?labels, "repaired function arguments");
            return FunctionArguments {
                raw: raw.to_string(),
                parse_errors: vec![format!(
                    "repaired malformed arguments ({}): {}",
                    labels.join(", "),
                    strict_error
                )],
                parsed: Some(value),
            };
        }
    }

    FunctionArguments::unparsed(raw, vec![strict_error])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_valid_json() {
        let args = parse_arguments(r#"{"name": "Ada", "langs": ["en"]}"#);
        assert_eq!(args.parsed, Some(json!({"name": "Ada", "langs": ["en"]})));
        assert!(args.parse_errors.is_empty());
    }

    #[rstest]
    #[case("")]
    #[case("   \n\t")]
    fn test_empty(#[case] raw: &str) {
        let args = parse_arguments(raw);
        assert_eq!(args.raw, raw);
        assert!(args.parsed.is_none());
        assert_eq!(args.parse_errors, vec!["arguments are empty".to_string()]);
    }

    #[rstest]
    #[case("```json\n{\"a\": 1}\n```")]
    #[case("{\"a\": 1,}")]
    #[case("{a: 1}")]
    #[case("{'a': 1}")]
    #[case("{\"a\": 1")]
    fn test_repaired(#[case] raw: &str) {
        let args = parse_arguments(raw);
        assert_eq!(args.raw, raw);
        assert_eq!(args.parsed, Some(json!({"a": 1})));
        assert_eq!(args.parse_errors.len(), 1);
        assert!(args.parse_errors[0].starts_with("repaired malformed arguments"));
    }

    #[rstest]
    #[case("{\"a\":")]
    #[case("hello world")]
    #[case("{\"a\": 1]]]")]
    #[case("\u{0}\u{1}{{{")]
    fn test_unrecoverable(#[case] raw: &str) {
        let args = parse_arguments(raw);
        assert_eq!(args.raw, raw);
        assert!(args.parsed.is_none());
        assert_eq!(args.parse_errors.len(), 1);
        assert!(!args.parse_errors[0].starts_with("repaired"));
    }

    #[test]
    fn test_null_parses_but_is_not_usable() {
        let args = parse_arguments("null");
        assert_eq!(args.parsed, Some(JsonValue::Null));
        assert!(!args.is_parsed());
    }
}
