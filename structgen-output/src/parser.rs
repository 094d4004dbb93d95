//! Extracting JSON from free-form model text.
//!
//! JSON-mode answers often arrive wrapped in prose or markdown. These helpers
//! locate the document and parse it, including best-effort parsing of a
//! document that is still being streamed.

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::{OutputError, OutputResult};
use crate::repair::repair_json;

/// Find the JSON document inside `text`.
///
/// Tries, in order: the whole text, a fenced code block, the first balanced
/// object, the first balanced array.
///
/// ```rust
/// use structgen_output::parser::extract_json_from_text;
///
/// let text = "Sure! ```json\n{\"ok\": true}\n``` Anything else?";
/// assert_eq!(extract_json_from_text(text).unwrap(), r#"{"ok": true}"#);
/// ```
pub fn extract_json_from_text(text: &str) -> OutputResult<String> {
    let text = text.trim();

    if is_json(text) {
        return Ok(text.to_string());
    }
    if let Some(block) = fenced_block(text) {
        return Ok(block.to_string());
    }
    if let Some(found) = balanced(text, '{', '}') {
        return Ok(found.to_string());
    }
    if let Some(found) = balanced(text, '[', ']') {
        return Ok(found.to_string());
    }

    Err(OutputError::NoJsonFound)
}

/// Extract and deserialize a JSON document from `text`.
pub fn parse_json_from_text<T: DeserializeOwned>(text: &str) -> OutputResult<T> {
    let json = extract_json_from_text(text)?;
    Ok(serde_json::from_str(&json)?)
}

/// Best-effort parse of an incomplete JSON document.
///
/// Used while streaming: the text is closed off and parsed; if that fails
/// the last incomplete member is dropped and the attempt repeated.
#[must_use]
pub fn parse_partial_json(text: &str) -> Option<JsonValue> {
    let start = text.find(['{', '['])?;
    let mut candidate = &text[start..];

    for _ in 0..8 {
        if let Some(value) = repair_json(candidate)
            .and_then(|r| serde_json::from_str::<JsonValue>(&r.text).ok())
        {
            return Some(value);
        }
        let cut = candidate.rfind(',')?;
        candidate = &candidate[..cut];
    }
    None
}

fn is_json(text: &str) -> bool {
    serde_json::from_str::<JsonValue>(text).is_ok()
}

fn fenced_block(text: &str) -> Option<&str> {
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        let body_start = after.find('\n').map_or(0, |i| i + 1);
        let lang = after[..body_start].trim();
        let body = &after[body_start..];
        let close = body.find("```")?;
        let content = body[..close].trim();
        if (lang.is_empty() || lang.eq_ignore_ascii_case("json")) && is_json(content) {
            return Some(content);
        }
        // inline fence on a single line: ```{"a":1}```
        let inline = after.find("```").map(|end| after[..end].trim());
        if let Some(inline) = inline.filter(|s| is_json(s)) {
            return Some(inline);
        }
        rest = &body[close + 3..];
    }
    None
}

fn balanced(text: &str, open: char, close: char) -> Option<&str> {
    let mut search_from = 0;
    while let Some(rel) = text[search_from..].find(open) {
        let start = search_from + rel;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (i, c) in text[start..].char_indices() {
            if escaped {
                escaped = false;
                continue;
            }
            match c {
                '\\' if in_string => escaped = true,
                '"' => in_string = !in_string,
                c if c == open && !in_string => depth += 1,
                c if c == close && !in_string => {
                    depth -= 1;
                    if depth == 0 {
                        let candidate = &text[start..=start + i];
                        if is_json(candidate) {
                            return Some(candidate);
                        }
                        break;
                    }
                }
                _ => {}
            }
        }
        search_from = start + open.len_utf8();
    }
    None
}
