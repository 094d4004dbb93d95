//! Compiled JSON Schemas and value validation.
//!
//! A [`Schema`] is compiled once and shared cheaply. Validation never fails
//! with an error: violations come back as [`ValidationError`] values inside a
//! [`ValidationReport`].

use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;
use structgen_core::ValidationError;

use crate::error::{OutputError, OutputResult};

/// Outcome of validating a value against a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Whether the value conforms.
    pub valid: bool,
    /// Violations, empty when `valid`.
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    /// A passing report.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    /// A failing report.
    #[must_use]
    pub fn failed(errors: Vec<ValidationError>) -> Self {
        Self {
            valid: false,
            errors,
        }
    }

    /// Convert into a `Result`, keeping the errors on failure.
    pub fn into_result(self) -> Result<(), Vec<ValidationError>> {
        if self.valid {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

struct CompiledSchema {
    document: JsonValue,
    compiled: JSONSchema,
}

/// An immutable, compiled JSON Schema.
#[derive(Clone)]
pub struct Schema {
    inner: Arc<CompiledSchema>,
}

impl Schema {
    /// Compile a schema document.
    pub fn new(document: JsonValue) -> OutputResult<Self> {
        let compiled = JSONSchema::compile(&document)
            .map_err(|e| OutputError::InvalidSchema(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(CompiledSchema { document, compiled }),
        })
    }

    /// The schema document as given.
    #[must_use]
    pub fn as_json(&self) -> &JsonValue {
        &self.inner.document
    }

    /// Validate a parsed value.
    #[must_use]
    pub fn validate(&self, value: &JsonValue) -> ValidationReport {
        match self.inner.compiled.validate(value) {
            Ok(()) => ValidationReport::ok(),
            Err(errors) => ValidationReport::failed(
                errors
                    .map(|e| ValidationError::new(e.instance_path.to_string(), e.to_string()))
                    .collect(),
            ),
        }
    }

    /// Whether the value conforms.
    #[must_use]
    pub fn is_valid(&self, value: &JsonValue) -> bool {
        self.inner.compiled.is_valid(value)
    }

    /// Wrap this schema as `{ thinking, output }`, thinking first.
    pub fn with_thinking(&self, thinking: &Schema) -> OutputResult<Schema> {
        Schema::new(serde_json::json!({
            "type": "object",
            "properties": {
                "thinking": thinking.as_json(),
                "output": self.as_json(),
            },
            "required": ["thinking", "output"],
            "additionalProperties": false,
        }))
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Schema").field(&self.inner.document).finish()
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.inner.document == other.inner.document
    }
}

impl TryFrom<JsonValue> for Schema {
    type Error = OutputError;

    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        Schema::new(value)
    }
}

/// Validate `value` against an uncompiled schema document.
///
/// A document that fails to compile yields a failing report with a single
/// root-level error.
#[must_use]
pub fn validate(schema: &JsonValue, value: &JsonValue) -> ValidationReport {
    match Schema::new(schema.clone()) {
        Ok(schema) => schema.validate(value),
        Err(err) => ValidationReport::failed(vec![ValidationError::root(err.to_string())]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn person() -> Schema {
        Schema::new(json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "integer", "minimum": 0},
                "tags": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["name"]
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_value() {
        let report = person().validate(&json!({"name": "Ada", "age": 36}));
        assert_eq!(report, ValidationReport::ok());
    }

    #[test]
    fn test_missing_required() {
        let report = person().validate(&json!({"age": 3}));
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].path, "");
        assert!(report.errors[0].message.contains("name"));
    }

    #[test]
    fn test_error_paths_are_pointers() {
        let report = person().validate(&json!({"name": "Ada", "age": -1, "tags": ["a", 2]}));
        assert!(!report.valid);
        let paths: Vec<_> = report.errors.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"/age"));
        assert!(paths.contains(&"/tags/1"));
    }

    #[test]
    fn test_invalid_schema_is_error() {
        let err = Schema::new(json!({"type": 12})).unwrap_err();
        assert!(matches!(err, OutputError::InvalidSchema(_)));
    }

    #[test]
    fn test_free_validate_never_fails() {
        let report = validate(&json!({"type": "nope"}), &json!(1));
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].message.starts_with("invalid schema"));

        assert!(validate(&json!({"type": "integer"}), &json!(1)).valid);
    }

    #[test]
    fn test_with_thinking() {
        let thinking = Schema::new(json!({
            "type": "object",
            "properties": {"steps": {"type": "array"}},
            "required": ["steps"]
        }))
        .unwrap();
        let wrapped = person().with_thinking(&thinking).unwrap();

        assert_eq!(
            wrapped.as_json()["required"],
            json!(["thinking", "output"])
        );
        assert!(wrapped.is_valid(&json!({"thinking": {"steps": []}, "output": {"name": "x"}})));
        assert!(!wrapped.is_valid(&json!({"output": {"name": "x"}})));
    }

    #[test]
    fn test_clone_is_shared() {
        let schema = person();
        let copy = schema.clone();
        assert_eq!(schema, copy);
        assert!(Arc::ptr_eq(&schema.inner, &copy.inner));
    }
}
