//! Retry configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How transient failures are retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Wait strategy.
    pub wait: WaitStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            wait: WaitStrategy::RetryAfter {
                fallback: Box::new(WaitStrategy::ExponentialJitter {
                    initial: Duration::from_millis(500),
                    max: Duration::from_secs(30),
                    multiplier: 2.0,
                    jitter: 0.1,
                }),
                max_wait: Duration::from_secs(60),
            },
        }
    }
}

impl RetryConfig {
    /// Create a new default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max retries.
    #[must_use]
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Set the wait strategy.
    #[must_use]
    pub fn wait(mut self, strategy: WaitStrategy) -> Self {
        self.wait = strategy;
        self
    }

    /// Use exponential backoff.
    #[must_use]
    pub fn exponential(self, initial: Duration, max: Duration) -> Self {
        self.wait(WaitStrategy::ExponentialBackoff {
            initial,
            max,
            multiplier: 2.0,
        })
    }

    /// Use fixed delay.
    #[must_use]
    pub fn fixed(self, delay: Duration) -> Self {
        self.wait(WaitStrategy::Fixed(delay))
    }

    /// Config that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new().max_retries(0).wait(WaitStrategy::None)
    }

    /// Total attempts including the first one.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Strategy for waiting between retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStrategy {
    /// No waiting.
    None,
    /// Fixed delay.
    Fixed(Duration),
    /// Exponential backoff.
    ExponentialBackoff {
        /// Initial delay.
        initial: Duration,
        /// Maximum delay.
        max: Duration,
        /// Multiplier for each attempt.
        multiplier: f64,
    },
    /// Exponential backoff with jitter.
    ExponentialJitter {
        /// Initial delay.
        initial: Duration,
        /// Maximum delay.
        max: Duration,
        /// Multiplier for each attempt.
        multiplier: f64,
        /// Jitter factor (0.0 to 1.0).
        jitter: f64,
    },
    /// Linear backoff.
    Linear {
        /// Initial delay.
        initial: Duration,
        /// Increment per attempt.
        increment: Duration,
        /// Maximum delay.
        max: Duration,
    },
    /// Honour a server-suggested delay, else fall back.
    RetryAfter {
        /// Used when no delay was suggested.
        fallback: Box<WaitStrategy>,
        /// Upper bound on a suggested delay.
        max_wait: Duration,
    },
}

impl WaitStrategy {
    /// Wait before the retry following failed attempt `attempt` (1-based).
    #[must_use]
    pub fn calculate(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        match self {
            WaitStrategy::None => Duration::ZERO,
            WaitStrategy::Fixed(d) => *d,
            WaitStrategy::ExponentialBackoff {
                initial,
                max,
                multiplier,
            } => {
                let delay = initial.as_secs_f64() * multiplier.powi(exponent);
                clamp_secs(delay, *max)
            }
            WaitStrategy::ExponentialJitter {
                initial,
                max,
                multiplier,
                jitter,
            } => {
                let base = initial.as_secs_f64() * multiplier.powi(exponent);
                let jitter_amount = base * jitter * random_jitter();
                clamp_secs(base + jitter_amount, *max)
            }
            WaitStrategy::Linear {
                initial,
                increment,
                max,
            } => {
                let delay = initial.saturating_add(increment.saturating_mul(attempt.saturating_sub(1)));
                delay.min(*max)
            }
            WaitStrategy::RetryAfter { fallback, max_wait } => retry_after
                .map(|d| d.min(*max_wait))
                .unwrap_or_else(|| fallback.calculate(attempt, None)),
        }
    }
}

fn clamp_secs(secs: f64, max: Duration) -> Duration {
    if !secs.is_finite() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(secs.min(max.as_secs_f64()))
}

/// Random factor between -1.0 and 1.0.
fn random_jitter() -> f64 {
    use rand::Rng;
    rand::thread_rng().gen_range(-1.0..1.0)
}
