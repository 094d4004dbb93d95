//! Selective math tagging over batches of strings.
//!
//! [`LatexFixer`] wraps math notation in `<latex>...</latex>` while leaving
//! everything else byte-identical. A local prefilter skips batches without
//! math-like markers. Otherwise a single triage call reports the strings that
//! need fixing together with their corrected text, and only those are
//! replaced. Fixes that touch code spans or existing `<latex>` regions are
//! discarded.

use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use structgen_core::ModelSettings;
use structgen_models::ModelPicking;
use structgen_output::Schema;
use tracing::{debug, warn};

use crate::error::{GenerationError, GenerationResult};
use crate::generator::Generator;
use crate::request::GenerationRequest;

/// Markers that make a string worth sending to the model.
const MATH_MARKERS: [&str; 3] = ["$", "\\", "<latex>"];

/// System prompt of the triage call.
pub const LATEX_FIXER_INSTRUCTIONS: &str = r#"You review short texts for math notation and tag it for rendering.

Rules:
1. Math written with $...$, $$...$$, \(...\) or \[...\], and bare math commands such as \frac{1}{2} or \alpha, must be wrapped as <latex>...</latex>. Remove the original delimiters.
2. Text already inside <latex>...</latex> is correct. Never change it.
3. Never tag anything inside code, neither inline `code` nor fenced ``` blocks. If code contains <latex> tags, remove the tags and keep the code as it was.
4. Inside <latex>, write every command with a single consistent backslash form, e.g. \frac, never mixing \\frac and \frac.
5. Change nothing else: wording, whitespace, punctuation and markdown stay exactly as they are.

Answer with needsFix false when no text needs a change. Otherwise set needsFix true and list one fix per changed text with its index, its original text and the complete fixed text."#;

/// Result of [`LatexFixer::fix`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixOutput {
    /// Same length and order as the input.
    pub fixed_strings: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Triage {
    needs_fix: bool,
    #[serde(default)]
    fixes: Vec<Fix>,
}

#[derive(Debug, Deserialize)]
struct Fix {
    index: usize,
    original: Option<String>,
    fixed: String,
}

/// Schema of the triage answer.
fn triage_schema() -> GenerationResult<Schema> {
    let schema = Schema::new(json!({
        "type": "object",
        "properties": {
            "needsFix": {"type": "boolean"},
            "fixes": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "index": {"type": "integer", "minimum": 0},
                        "original": {"type": "string"},
                        "fixed": {"type": "string"}
                    },
                    "required": ["index", "fixed"]
                }
            }
        },
        "required": ["needsFix"],
        "if": {"properties": {"needsFix": {"const": true}}},
        "then": {"required": ["fixes"], "properties": {"fixes": {"minItems": 1}}}
    }))?;
    Ok(schema)
}

/// Which protected region a guard compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpanKind {
    Code,
    Latex,
}

impl SpanKind {
    fn label(self) -> &'static str {
        match self {
            SpanKind::Code => "code span",
            SpanKind::Latex => "<latex> region",
        }
    }
}

#[derive(Debug)]
struct SpanGuard {
    code: Regex,
    latex: Regex,
    tag: Regex,
}

impl SpanGuard {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            code: Regex::new(r"(?s)```.*?```|`[^`\n]+`")?,
            latex: Regex::new(r"(?s)<latex>.*?</latex>")?,
            tag: Regex::new(r"</?latex>")?,
        })
    }

    /// Code spans with any `<latex>` tags removed.
    fn code_spans(&self, text: &str) -> Vec<String> {
        self.code
            .find_iter(text)
            .map(|m| self.tag.replace_all(m.as_str(), "").into_owned())
            .collect()
    }

    /// `<latex>` regions outside code.
    fn latex_regions(&self, text: &str) -> Vec<String> {
        let outside = self.code.replace_all(text, "");
        self.latex
            .find_iter(&outside)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// The first protected region a fix changed, if any.
    fn violation(&self, original: &str, fixed: &str) -> Option<SpanKind> {
        if self.code_spans(original) != self.code_spans(fixed) {
            return Some(SpanKind::Code);
        }
        let mut rest = fixed;
        for region in self.latex_regions(original) {
            match rest.find(&region) {
                Some(at) => rest = &rest[at + region.len()..],
                None => return Some(SpanKind::Latex),
            }
        }
        None
    }
}

/// Tags math notation in batches of strings.
///
/// ```rust,no_run
/// use structgen::{Generator, LatexFixer};
///
/// # async fn run() -> Result<(), structgen::GenerationError> {
/// let fixer = LatexFixer::new(Generator::with_defaults())?.model("openai:gpt-4o-mini");
/// let out = fixer
///     .fix(&["The fraction $\\frac{1}{2}$ is correct".to_string()])
///     .await?;
/// assert_eq!(out.fixed_strings[0], "The fraction <latex>\\frac{1}{2}</latex> is correct");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LatexFixer {
    generator: Generator,
    models: Vec<String>,
    picking: Option<ModelPicking>,
    max_feedback_loops: u32,
    settings: Option<ModelSettings>,
    guard: Arc<SpanGuard>,
}

impl LatexFixer {
    /// Fixer issuing its triage call through `generator`.
    pub fn new(generator: Generator) -> GenerationResult<Self> {
        let guard = SpanGuard::new()
            .map_err(|e| GenerationError::configuration(format!("span guard: {e}")))?;
        Ok(Self {
            generator,
            models: Vec::new(),
            picking: None,
            max_feedback_loops: 1,
            settings: None,
            guard: Arc::new(guard),
        })
    }

    /// Add a candidate model.
    #[must_use]
    pub fn model(mut self, id: impl Into<String>) -> Self {
        self.models.push(id.into());
        self
    }

    /// Add several candidate models.
    #[must_use]
    pub fn models<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Rank candidate models by a preference.
    #[must_use]
    pub fn picking(mut self, picking: ModelPicking) -> Self {
        self.picking = Some(picking);
        self
    }

    /// Follow-up calls allowed when the triage answer is invalid. Default 1.
    #[must_use]
    pub fn max_feedback_loops(mut self, loops: u32) -> Self {
        self.max_feedback_loops = loops;
        self
    }

    /// Override model settings for the triage call.
    #[must_use]
    pub fn settings(mut self, settings: ModelSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Tag math in `strings`, returning them in the same order.
    ///
    /// Fails when the triage call fails or its answer cannot be applied;
    /// partially fixed output is never returned.
    pub async fn fix(&self, strings: &[String]) -> GenerationResult<FixOutput> {
        // distinct candidates, and for each input the candidate it maps to
        let mut candidates: Vec<&str> = Vec::new();
        let mut seen: HashMap<&str, usize> = HashMap::new();
        let slots: Vec<Option<usize>> = strings
            .iter()
            .map(|s| {
                if !has_math_markers(s) {
                    return None;
                }
                Some(*seen.entry(s.as_str()).or_insert_with(|| {
                    candidates.push(s.as_str());
                    candidates.len() - 1
                }))
            })
            .collect();

        if candidates.is_empty() {
            debug!(strings = strings.len(), "no math markers, skipping model call");
            return Ok(FixOutput {
                fixed_strings: strings.to_vec(),
            });
        }

        let triage = self.triage(&candidates).await?;
        if !triage.needs_fix {
            debug!(candidates = candidates.len(), "triage found nothing to fix");
            return Ok(FixOutput {
                fixed_strings: strings.to_vec(),
            });
        }
        if triage.fixes.is_empty() {
            return Err(GenerationError::Rewrite(
                "triage reported fixes but listed none".into(),
            ));
        }

        let fixed = self.apply(&candidates, triage.fixes);
        let fixed_strings = strings
            .iter()
            .zip(slots)
            .map(|(s, slot)| match slot.and_then(|i| fixed[i].clone()) {
                Some(replacement) => replacement,
                None => s.clone(),
            })
            .collect();
        Ok(FixOutput { fixed_strings })
    }

    async fn triage(&self, candidates: &[&str]) -> GenerationResult<Triage> {
        let batch: Vec<_> = candidates
            .iter()
            .enumerate()
            .map(|(index, text)| json!({"index": index, "text": text}))
            .collect();
        let batch = serde_json::to_string_pretty(&batch)
            .map_err(|e| GenerationError::configuration(format!("encoding texts: {e}")))?;

        let mut request = GenerationRequest::new(triage_schema()?)
            .models(self.models.iter().cloned())
            .system(LATEX_FIXER_INSTRUCTIONS)
            .prompt(format!("Texts:\n{batch}"))
            .description("Report which texts need math tagging and their fixed versions.")
            .max_feedback_loops(self.max_feedback_loops);
        request.picking = self.picking;
        request.settings.clone_from(&self.settings);

        debug!(candidates = candidates.len(), "requesting latex triage");
        let result = self.generator.gen_object::<Triage>(request).await?;
        Ok(result.object)
    }

    /// Replacement text per candidate; `None` keeps the candidate as is.
    fn apply(&self, candidates: &[&str], fixes: Vec<Fix>) -> Vec<Option<String>> {
        let mut fixed = vec![None; candidates.len()];
        for fix in fixes {
            let target = resolve_target(candidates, &fix);
            let Some(target) = target else {
                warn!(index = fix.index, "fix does not match any input, ignoring");
                continue;
            };

            let original = candidates[target];
            if let Some(kind) = self.guard.violation(original, &fix.fixed) {
                warn!(
                    index = target,
                    region = kind.label(),
                    "fix changed a protected region, keeping original"
                );
                continue;
            }
            if fix.fixed != original {
                fixed[target] = Some(fix.fixed);
            }
        }
        fixed
    }
}

/// Candidate a fix belongs to. A reported `original` outranks the index.
fn resolve_target(candidates: &[&str], fix: &Fix) -> Option<usize> {
    let by_index = candidates.get(fix.index).map(|_| fix.index);
    match fix.original.as_deref() {
        Some(original) if by_index.map(|i| candidates[i]) != Some(original) => {
            candidates.iter().position(|c| *c == original)
        }
        _ => by_index,
    }
}

fn has_math_markers(text: &str) -> bool {
    MATH_MARKERS.iter().any(|m| text.contains(m))
}
