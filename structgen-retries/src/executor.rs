//! Running an operation under a [`RetryConfig`].

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::Retryable;

/// What happened across the attempts of one operation.
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    /// Attempts made (1-based count).
    pub attempt: u32,
    /// Total time spent waiting.
    pub total_wait_time: Duration,
    /// History of attempts.
    pub history: Vec<AttemptInfo>,
}

/// Information about a single attempt.
#[derive(Debug, Clone)]
pub struct AttemptInfo {
    /// Attempt number.
    pub attempt: u32,
    /// Whether it succeeded.
    pub success: bool,
    /// Error message if failed.
    pub error: Option<String>,
    /// Time waited after this attempt.
    pub wait_time: Duration,
}

/// Execute an operation with retries.
///
/// Errors that are not [`Retryable::is_retryable`] are returned at once; the
/// last error is returned when attempts run out.
///
/// ```rust
/// use structgen_retries::{with_retry, RetryConfig, RetryableError};
///
/// # tokio_test::block_on(async {
/// let value = with_retry(&RetryConfig::no_retry(), || async {
///     Ok::<_, RetryableError>(7)
/// })
/// .await
/// .unwrap();
/// assert_eq!(value, 7);
/// # });
/// ```
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    with_retry_state(config, operation).await.0
}

/// Execute with retries and report the attempt history.
pub async fn with_retry_state<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
) -> (Result<T, E>, RetryState)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let mut state = RetryState::default();
    let max_attempts = config.max_attempts();

    loop {
        state.attempt += 1;
        debug!(attempt = state.attempt, max_attempts, "executing attempt");

        match operation().await {
            Ok(result) => {
                state.history.push(AttemptInfo {
                    attempt: state.attempt,
                    success: true,
                    error: None,
                    wait_time: Duration::ZERO,
                });
                return (Ok(result), state);
            }
            Err(error) => {
                let retryable = error.is_retryable();
                if !retryable || state.attempt >= max_attempts {
                    warn!(
                        attempt = state.attempt,
                        retryable,
                        error = %error,
                        "giving up"
                    );
                    state.history.push(AttemptInfo {
                        attempt: state.attempt,
                        success: false,
                        error: Some(error.to_string()),
                        wait_time: Duration::ZERO,
                    });
                    return (Err(error), state);
                }

                let wait = config.wait.calculate(state.attempt, error.retry_after());
                state.total_wait_time += wait;
                state.history.push(AttemptInfo {
                    attempt: state.attempt,
                    success: false,
                    error: Some(error.to_string()),
                    wait_time: wait,
                });

                debug!(
                    attempt = state.attempt,
                    wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "waiting before retry"
                );
                sleep(wait).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RetryableError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn counting<T: Clone>(
        counter: &Arc<AtomicU32>,
        fail_first: u32,
        err: fn() -> RetryableError,
        ok: T,
    ) -> impl FnMut() -> std::future::Ready<Result<T, RetryableError>> {
        let counter = Arc::clone(counter);
        move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(if n < fail_first { Err(err()) } else { Ok(ok.clone()) })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_eventual_success() {
        let config = RetryConfig::new().max_retries(3).fixed(Duration::from_millis(10));
        let attempts = Arc::new(AtomicU32::new(0));

        let (result, state) = with_retry_state(
            &config,
            counting(&attempts, 2, || RetryableError::http(500, "server error"), 42),
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(state.total_wait_time, Duration::from_millis(20));
        assert_eq!(state.history.len(), 3);
        assert!(state.history[2].success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted() {
        let config = RetryConfig::new().max_retries(2).fixed(Duration::from_millis(1));
        let attempts = Arc::new(AtomicU32::new(0));

        let result = with_retry(
            &config,
            counting(&attempts, u32::MAX, || RetryableError::Timeout, ()),
        )
        .await;

        assert!(matches!(result, Err(RetryableError::Timeout)));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_stops_at_once() {
        let config = RetryConfig::new().max_retries(3);
        let attempts = Arc::new(AtomicU32::new(0));

        let result = with_retry(
            &config,
            counting(&attempts, u32::MAX, || RetryableError::http(400, "bad request"), ()),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_is_honoured() {
        let config = RetryConfig::default().max_retries(1);
        let attempts = Arc::new(AtomicU32::new(0));
        let start = tokio::time::Instant::now();

        let result = with_retry(
            &config,
            counting(
                &attempts,
                1,
                || RetryableError::rate_limited(Some(Duration::from_secs(7))),
                "ok",
            ),
        )
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert!(start.elapsed() >= Duration::from_secs(7));
    }
}
