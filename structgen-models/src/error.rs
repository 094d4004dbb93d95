//! Model-related error types.

use std::time::Duration;
use structgen_retries::Retryable;
use thiserror::Error;

/// Errors raised at the model boundary.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Non-success HTTP status without a more specific mapping.
    #[error("HTTP error: {status} - {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Provider reported an error in its payload.
    #[error("API error: {message}")]
    Api {
        /// Error message.
        message: String,
        /// Provider error code.
        code: Option<String>,
    },

    /// The round trip exceeded its time budget.
    #[error("request timeout after {0:?}")]
    Timeout(Duration),

    /// Rate limited by the provider.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Suggested delay.
        retry_after: Option<Duration>,
    },

    /// Credentials were rejected.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The provider answered with something we could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Unknown model.
    #[error("model not found: {0}")]
    NotFound(String),

    /// Feature not supported by this model.
    #[error("feature not supported: {0}")]
    NotSupported(String),

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Could not reach the provider.
    #[error("connection error: {0}")]
    Connection(String),

    /// The provider refused to answer.
    #[error("content filtered: {0}")]
    ContentFiltered(String),

    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Anything else.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ModelError {
    /// Whether a later attempt may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            ModelError::Timeout(_) | ModelError::RateLimited { .. } | ModelError::Connection(_) => {
                true
            }
            ModelError::Http { status, .. } => *status >= 500 || *status == 408,
            _ => false,
        }
    }

    /// Provider-suggested delay, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ModelError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Create an API error.
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
            code: None,
        }
    }

    /// Create an HTTP error.
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    /// Create a rate limited error.
    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        Self::RateLimited { retry_after }
    }

    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Authentication(message.into())
    }

    /// Create an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    /// Create a not supported error.
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported(message.into())
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ModelError::Timeout(Duration::ZERO)
        } else if err.is_connect() {
            ModelError::Connection(err.to_string())
        } else if let Some(status) = err.status() {
            ModelError::http(status.as_u16(), err.to_string())
        } else {
            ModelError::Other(err.into())
        }
    }
}

impl Retryable for ModelError {
    fn is_retryable(&self) -> bool {
        ModelError::is_retryable(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        ModelError::retry_after(self)
    }
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ModelError::Timeout(Duration::from_secs(1)), true)]
    #[case(ModelError::rate_limited(None), true)]
    #[case(ModelError::Connection("refused".into()), true)]
    #[case(ModelError::http(503, "unavailable"), true)]
    #[case(ModelError::http(408, "timeout"), true)]
    #[case(ModelError::http(400, "bad request"), false)]
    #[case(ModelError::auth("bad key"), false)]
    #[case(ModelError::NotFound("gpt-x".into()), false)]
    #[case(ModelError::api("boom"), false)]
    fn test_is_retryable(#[case] err: ModelError, #[case] expected: bool) {
        assert_eq!(err.is_retryable(), expected);
    }

    #[test]
    fn test_retry_after() {
        let err = ModelError::rate_limited(Some(Duration::from_secs(7)));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(ModelError::http(500, "x").retry_after(), None);
    }

    #[test]
    fn test_display() {
        assert!(ModelError::http(404, "missing").to_string().contains("404"));
        assert_eq!(
            ModelError::configuration("OPENAI_API_KEY not set").to_string(),
            "configuration error: OPENAI_API_KEY not set"
        );
    }
}
