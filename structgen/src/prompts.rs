//! Prompt text used by the generator.

use structgen_core::ValidationError;

/// Name of the function declared in tool mode.
pub const DEFAULT_OUTPUT_FUNCTION_NAME: &str = "output";

/// Description of the output function when the request gives none.
pub const DEFAULT_OUTPUT_DESCRIPTION: &str =
    "Return the final result. The arguments must match the parameter schema exactly.";

/// Instruction sent with a follow-up call after an invalid answer.
pub const DEFAULT_FEEDBACK_PROMPT: &str = "Your previous answer did not match the required JSON \
Schema. Fix every error listed above and answer again with the complete corrected object. \
Do not add fields the schema does not define.";

/// Build the follow-up message: the errors first, then the instruction.
#[must_use]
pub fn render_feedback(errors: &[ValidationError], instruction: &str) -> String {
    let mut out = String::from("The previous answer was rejected:\n");
    if errors.is_empty() {
        out.push_str("- the answer could not be read as a JSON object\n");
    }
    for error in errors {
        if error.path.is_empty() {
            out.push_str(&format!("- {}\n", error.message));
        } else {
            out.push_str(&format!("- at {}: {}\n", error.path, error.message));
        }
    }
    out.push('\n');
    out.push_str(instruction);
    out
}
