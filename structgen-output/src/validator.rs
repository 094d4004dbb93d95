//! Choice filtering for function-call responses.
//!
//! Each choice of a [`ModelResponse`] is checked on its own. A choice that
//! carries a function call survives only when the call names a declared
//! function, carries parsed arguments, and those arguments satisfy the
//! declared parameter schema. Choices without a function call always
//! survive. Rejections never affect sibling choices.

use std::collections::HashMap;

use structgen_core::{
    Choice, ChoiceRejection, FunctionDeclaration, ModelResponse, RejectedChoice,
};

use crate::schema::Schema;

/// A filtered response together with what was dropped and why.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedResponse {
    /// Response holding only surviving choices, in original relative order.
    pub response: ModelResponse,
    /// Dropped choices.
    pub rejections: Vec<RejectedChoice>,
}

impl ValidatedResponse {
    /// Whether no choice survived.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.response.is_empty()
    }
}

/// Filter a response, discarding the rejection details.
#[must_use]
pub fn validate_response(
    response: ModelResponse,
    declared: &[FunctionDeclaration],
) -> ModelResponse {
    validate_response_with_report(response, declared).response
}

/// Filter a response and report every dropped choice.
///
/// Every drop is also logged at `warn` level.
#[must_use]
pub fn validate_response_with_report(
    mut response: ModelResponse,
    declared: &[FunctionDeclaration],
) -> ValidatedResponse {
    let mut schemas = SchemaCache::new(declared);
    let mut kept = Vec::with_capacity(response.choices.len());
    let mut rejections = Vec::new();

    for choice in std::mem::take(&mut response.choices) {
        match check_choice(&choice, declared, &mut schemas) {
            Ok(()) => kept.push(choice),
            Err(reason) => {
                tracing::warn!(
                    choice = choice.index,
                    function = choice.function_call().map(|c| c.name.as_str()),
                    reason = %reason,
                    "dropping invalid choice"
                );
                rejections.push(RejectedChoice {
                    index: choice.index,
                    reason,
                });
            }
        }
    }

    response.choices = kept;
    ValidatedResponse {
        response,
        rejections,
    }
}

fn check_choice(
    choice: &Choice,
    declared: &[FunctionDeclaration],
    schemas: &mut SchemaCache<'_>,
) -> Result<(), ChoiceRejection> {
    let Some(call) = choice.function_call() else {
        return Ok(());
    };

    if declared.is_empty() {
        return Err(ChoiceRejection::NoDeclaredFunctions);
    }

    let name = call.name().ok_or(ChoiceRejection::MissingFunctionName)?;

    let declaration = schemas.resolve(name)?;

    let Some(arguments) = call.arguments.value() else {
        return Err(ChoiceRejection::MissingArguments {
            name: name.to_string(),
            parse_errors: call.arguments.parse_errors.clone(),
        });
    };

    let report = schemas.compile(declaration)?.validate(arguments);
    if report.valid {
        Ok(())
    } else {
        Err(ChoiceRejection::SchemaValidationFailure {
            name: name.to_string(),
            errors: report.errors,
        })
    }
}

/// Compiles each declared parameter schema at most once per response.
struct SchemaCache<'a> {
    declared: &'a [FunctionDeclaration],
    compiled: HashMap<&'a str, Result<Schema, ChoiceRejection>>,
}

impl<'a> SchemaCache<'a> {
    fn new(declared: &'a [FunctionDeclaration]) -> Self {
        Self {
            declared,
            compiled: HashMap::new(),
        }
    }

    fn resolve(&self, name: &str) -> Result<&'a FunctionDeclaration, ChoiceRejection> {
        let mut matches = self.declared.iter().filter(|d| d.name == name);
        let Some(declaration) = matches.next() else {
            return Err(ChoiceRejection::UnresolvedFunctionCall {
                name: name.to_string(),
            });
        };
        if matches.next().is_some() {
            return Err(ChoiceRejection::InvalidDeclaration {
                name: name.to_string(),
                message: "function is declared more than once".to_string(),
            });
        }
        Ok(declaration)
    }

    fn compile(&mut self, declaration: &'a FunctionDeclaration) -> Result<Schema, ChoiceRejection> {
        self.compiled
            .entry(declaration.name.as_str())
            .or_insert_with(|| {
                Schema::new(declaration.parameters.clone()).map_err(|e| {
                    ChoiceRejection::InvalidDeclaration {
                        name: declaration.name.clone(),
                        message: e.to_string(),
                    }
                })
            })
            .clone()
    }
}
