//! Retry utilities with linear backoff.
//!
//! Image generation is retried a fixed number of times; the wait before
//! retry `n` is `n * base_delay` (1, 2, 3, ... units). No wait follows the
//! final attempt.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::metrics;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Unit of the linear backoff.
    pub base_delay: Duration,
    /// Operation name for logging and metrics.
    pub operation_name: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            operation_name: "operation".to_string(),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with the given operation name.
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..Default::default()
        }
    }

    /// Set the total number of attempts (at least one).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the backoff unit.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Result of a retry operation.
#[derive(Debug)]
pub enum RetryResult<T, E> {
    /// Operation succeeded.
    Success(T),
    /// Operation failed after all attempts were used.
    Failed { error: E, attempts: u32 },
}

impl<T, E> RetryResult<T, E> {
    /// Returns true if the operation succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, RetryResult::Success(_))
    }

    /// Convert into a `Result`, mapping the final error and attempt count.
    pub fn into_result<F, E2>(self, on_failure: F) -> Result<T, E2>
    where
        F: FnOnce(E, u32) -> E2,
    {
        match self {
            RetryResult::Success(v) => Ok(v),
            RetryResult::Failed { error, attempts } => Err(on_failure(error, attempts)),
        }
    }
}

/// Execute an async operation with linear-backoff retries.
///
/// Every error is retried until `max_attempts` is reached.
///
/// # Example
/// ```ignore
/// let config = RetryConfig::new("image_generation").with_max_attempts(3);
/// let result = retry_async(&config, || async { provider.create_image(&req).await }).await;
/// ```
pub async fn retry_async<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1u32;

    loop {
        match operation().await {
            Ok(value) => return RetryResult::Success(value),
            Err(e) if attempt < max_attempts => {
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    "{} attempt {} failed, retrying in {:?}: {}",
                    config.operation_name,
                    attempt,
                    delay,
                    e
                );
                metrics::record_retry(&config.operation_name);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(
                    attempt,
                    "{} failed after {} attempts: {}", config.operation_name, attempt, e
                );
                return RetryResult::Failed { error: e, attempts: attempt };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_linear_delays() {
        let config = RetryConfig::new("test").with_base_delay(Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(3));
    }

    #[test]
    fn test_max_attempts_floor() {
        assert_eq!(RetryConfig::new("test").with_max_attempts(0).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt_after_one_then_two() {
        let config = RetryConfig::new("test").with_max_attempts(3);
        let calls = Arc::new(AtomicU32::new(0));
        let start = tokio::time::Instant::now();

        let result = retry_async(&config, || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(format!("boom {}", n))
                } else {
                    Ok("url")
                }
            }
        })
        .await;

        assert!(result.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_without_trailing_sleep() {
        let config = RetryConfig::new("test").with_max_attempts(3);
        let start = tokio::time::Instant::now();

        let result: RetryResult<(), String> =
            retry_async(&config, || async { Err("down".to_string()) }).await;

        match result {
            RetryResult::Failed { attempts, error } => {
                assert_eq!(attempts, 3);
                assert_eq!(error, "down");
            }
            RetryResult::Success(_) => panic!("expected failure"),
        }
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }
}
