//! Retry error types.

use std::time::Duration;
use thiserror::Error;

/// An error that knows whether another attempt may help.
pub trait Retryable {
    /// Whether a later attempt may succeed.
    fn is_retryable(&self) -> bool;

    /// Delay suggested by the failing side, if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// General-purpose retryable error for operations without their own type.
#[derive(Debug, Error)]
pub enum RetryableError {
    /// HTTP error with status code.
    #[error("HTTP error {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Rate limited.
    #[error("rate limited")]
    RateLimited {
        /// Suggested retry time.
        retry_after: Option<Duration>,
    },

    /// Timeout.
    #[error("timeout")]
    Timeout,

    /// Connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// Other error, never retried.
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl RetryableError {
    /// Create an HTTP error.
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    /// Create a rate limit error.
    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        Self::RateLimited { retry_after }
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }
}

impl Retryable for RetryableError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            Self::RateLimited { .. } | Self::Timeout | Self::Connection(_) => true,
            Self::Other(_) => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Result type for retry operations.
pub type RetryResult<T> = Result<T, RetryableError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(RetryableError::rate_limited(None), true)]
    #[case(RetryableError::Timeout, true)]
    #[case(RetryableError::connection("reset"), true)]
    #[case(RetryableError::http(500, "error"), true)]
    #[case(RetryableError::http(408, "slow"), true)]
    #[case(RetryableError::http(400, "bad request"), false)]
    #[case(RetryableError::Other(anyhow::anyhow!("boom")), false)]
    fn test_retryable(#[case] err: RetryableError, #[case] expected: bool) {
        assert_eq!(err.is_retryable(), expected);
    }

    #[test]
    fn test_retry_after() {
        let err = RetryableError::rate_limited(Some(Duration::from_secs(5)));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(5)));
        assert_eq!(RetryableError::Timeout.retry_after(), None);
    }
}
