//! Token accounting.

use serde::{Deserialize, Serialize};

/// Token usage reported for one model call, or summed over several.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestUsage {
    /// Prompt tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_tokens: Option<u64>,
    /// Completion tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_tokens: Option<u64>,
    /// Prompt plus completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

impl RequestUsage {
    /// Empty usage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Usage with both token counts known.
    #[must_use]
    pub fn with_tokens(request_tokens: u64, response_tokens: u64) -> Self {
        Self {
            request_tokens: Some(request_tokens),
            response_tokens: Some(response_tokens),
            total_tokens: Some(request_tokens + response_tokens),
        }
    }

    /// Add another record into this one.
    pub fn merge(&mut self, other: &RequestUsage) {
        self.request_tokens = add_opt(self.request_tokens, other.request_tokens);
        self.response_tokens = add_opt(self.response_tokens, other.response_tokens);
        self.total_tokens = match (self.request_tokens, self.response_tokens) {
            (None, None) => add_opt(self.total_tokens, other.total_tokens),
            (req, resp) => Some(req.unwrap_or(0) + resp.unwrap_or(0)),
        };
    }

    /// Total tokens, computed if the provider did not report it.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total_tokens
            .unwrap_or_else(|| self.request_tokens.unwrap_or(0) + self.response_tokens.unwrap_or(0))
    }

    /// Whether no counts are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.request_tokens.is_none() && self.response_tokens.is_none() && self.total_tokens.is_none()
    }
}

fn add_opt(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a + b),
        (a, b) => a.or(b),
    }
}

impl std::ops::AddAssign for RequestUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.merge(&rhs);
    }
}
