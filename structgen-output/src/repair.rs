//! Conservative repair of almost-JSON text.
//!
//! Models frequently emit argument text that is JSON in spirit but not in
//! letter. The repair pass handles a fixed set of defects and nothing else:
//!
//! - markdown code fences around the document
//! - trailing commas before `}` or `]`
//! - unquoted object keys
//! - single-quoted strings
//! - unclosed strings, objects and arrays at end of input

/// A single kind of fix applied by [`repair_json`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repair {
    /// Removed surrounding markdown fences.
    StrippedFences,
    /// Dropped a trailing comma.
    TrailingComma,
    /// Quoted a bare object key.
    UnquotedKey,
    /// Converted a single-quoted string.
    SingleQuotes,
    /// Closed an unterminated string.
    UnterminatedString,
    /// Closed an unbalanced object or array.
    UnclosedBrackets,
}

impl Repair {
    /// Short human readable label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Repair::StrippedFences => "stripped markdown fences",
            Repair::TrailingComma => "removed trailing comma",
            Repair::UnquotedKey => "quoted bare key",
            Repair::SingleQuotes => "converted single quotes",
            Repair::UnterminatedString => "closed unterminated string",
            Repair::UnclosedBrackets => "closed unbalanced brackets",
        }
    }
}

/// Repaired text and the list of distinct fixes applied, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repaired {
    /// The rewritten text.
    pub text: String,
    /// Fixes applied.
    pub repairs: Vec<Repair>,
}

impl Repaired {
    fn note(&mut self, repair: Repair) {
        if !self.repairs.contains(&repair) {
            self.repairs.push(repair);
        }
    }
}

/// Remove a surrounding markdown fence, with or without a language tag.
#[must_use]
pub fn strip_fences(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let rest = trimmed.strip_prefix("```")?;
    let body_start = rest.find('\n').map_or(rest.len(), |i| i + 1);
    let body = &rest[body_start..];
    let body = body.trim_end();
    let body = body.strip_suffix("```").unwrap_or(body);
    Some(body.trim())
}

/// Rewrite `text` into something `serde_json` has a chance of accepting.
///
/// Returns `None` when the text ends in a position that cannot be closed
/// without inventing a value (for example right after a `:`).
#[must_use]
pub fn repair_json(text: &str) -> Option<Repaired> {
    let mut out = Repaired {
        text: String::with_capacity(text.len() + 8),
        repairs: Vec::new(),
    };

    let source = match strip_fences(text) {
        Some(inner) => {
            out.note(Repair::StrippedFences);
            inner
        }
        None => text.trim(),
    };

    let chars: Vec<char> = source.chars().collect();
    let mut stack: Vec<char> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => {
                let (end, closed) = copy_string(&chars, i, '"', &mut out.text);
                if !closed {
                    out.note(Repair::UnterminatedString);
                }
                i = end;
                continue;
            }
            '\'' => {
                out.note(Repair::SingleQuotes);
                let (end, closed) = copy_string(&chars, i, '\'', &mut out.text);
                if !closed {
                    out.note(Repair::UnterminatedString);
                }
                i = end;
                continue;
            }
            '{' | '[' => {
                stack.push(c);
                out.text.push(c);
            }
            '}' | ']' => {
                let expected = if c == '}' { '{' } else { '[' };
                if stack.last() != Some(&expected) {
                    return None;
                }
                stack.pop();
                out.text.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if matches!(next, Some('}') | Some(']')) {
                    out.note(Repair::TrailingComma);
                } else {
                    out.text.push(c);
                }
            }
            c if is_key_start(c) && stack.last() == Some(&'{') && expects_key(&out.text) => {
                let start = i;
                while i < chars.len() && is_key_char(chars[i]) {
                    i += 1;
                }
                out.text.push('"');
                out.text.extend(&chars[start..i]);
                out.text.push('"');
                out.note(Repair::UnquotedKey);
                continue;
            }
            _ => out.text.push(c),
        }
        i += 1;
    }

    if !stack.is_empty() {
        let trimmed_len = out.text.trim_end().len();
        out.text.truncate(trimmed_len);
        if out.text.ends_with(',') {
            out.text.pop();
            out.note(Repair::TrailingComma);
        }
        if out.text.ends_with(':') {
            return None;
        }
        while let Some(open) = stack.pop() {
            out.text.push(if open == '{' { '}' } else { ']' });
        }
        out.note(Repair::UnclosedBrackets);
    }

    Some(out)
}

/// Copy a string literal starting at `start` as a double-quoted JSON string.
///
/// Returns the index after the literal and whether it was terminated.
fn copy_string(chars: &[char], start: usize, quote: char, out: &mut String) -> (usize, bool) {
    out.push('"');
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' if i + 1 < chars.len() => {
                let next = chars[i + 1];
                if quote == '\'' && next == '\'' {
                    out.push('\'');
                } else {
                    out.push('\\');
                    out.push(next);
                }
                i += 2;
                continue;
            }
            '\\' => {
                i += 1;
                continue;
            }
            c if c == quote => {
                out.push('"');
                return (i + 1, true);
            }
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
        i += 1;
    }
    out.push('"');
    (i, false)
}

fn is_key_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '-'
}

fn expects_key(written: &str) -> bool {
    matches!(written.trim_end().chars().last(), Some('{') | Some(','))
}
