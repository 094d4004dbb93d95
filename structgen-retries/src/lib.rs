//! # structgen-retries
//!
//! Retry policy for transient failures of model calls.
//!
//! - **[`RetryConfig`]**: how many retries and how long to wait
//! - **[`WaitStrategy`]**: fixed, linear, exponential (with or without
//!   jitter), or server-suggested delays
//! - **[`Retryable`]**: implemented by error types that know whether another
//!   attempt may help
//! - **[`with_retry`]**: run an async operation under a config
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use structgen_retries::{with_retry, RetryConfig, RetryableError};
//!
//! # tokio_test::block_on(async {
//! let config = RetryConfig::new()
//!     .max_retries(3)
//!     .exponential(Duration::from_millis(1), Duration::from_millis(10));
//!
//! let result = with_retry(&config, || async { Ok::<_, RetryableError>("done") }).await;
//! assert_eq!(result.unwrap(), "done");
//! # });
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod executor;

pub use config::{RetryConfig, WaitStrategy};
pub use error::{RetryResult, Retryable, RetryableError};
pub use executor::{with_retry, with_retry_state, AttemptInfo, RetryState};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{with_retry, RetryConfig, RetryResult, Retryable, RetryableError, WaitStrategy};
}
