//! Retry policy with exponential backoff for provider requests.
//!
//! Backoff durations come from `backoff::ExponentialBackoff`: each wait
//! doubles (by default) and carries ±20% jitter, capped at 30 s.
//!
//! # Retry Decision
//! - Retry on: 429 (rate limit), 5xx/529 (server errors), timeouts,
//!   connection resets
//! - Do NOT retry: 400, 401, 403, 404 (client errors)

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use tokio::time::sleep;

use crate::domain::ports::{ProviderError, ProviderResult};

/// Retry policy with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries before giving up.
    pub max_retries: u32,
    /// Initial backoff duration in milliseconds.
    pub base_ms: u64,
    /// Multiplier applied per attempt.
    pub factor: f64,
    /// Maximum backoff duration in milliseconds.
    pub cap_ms: u64,
    /// Randomization factor (0.2 = ±20% jitter).
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_ms: 500,
            factor: 2.0,
            cap_ms: 30_000,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_ms: u64, factor: f64, cap_ms: u64, jitter: f64) -> Self {
        Self {
            max_retries,
            base_ms,
            factor,
            cap_ms,
            jitter,
        }
    }

    /// Build the stateful backoff source for one retry loop.
    pub fn backoff_source(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.base_ms))
            .with_multiplier(self.factor)
            .with_randomization_factor(self.jitter)
            .with_max_interval(Duration::from_millis(self.cap_ms))
            .with_max_elapsed_time(None)
            .build()
    }

    /// Execute an async operation with retry on transient errors.
    ///
    /// Permanent errors are surfaced immediately; transient errors are
    /// retried up to `max_retries` times with jittered exponential backoff.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> ProviderResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let mut source = self.backoff_source();
        let mut attempt = 0u32;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    if !err.is_transient() || attempt >= self.max_retries {
                        return Err(err);
                    }

                    let wait = source
                        .next_backoff()
                        .unwrap_or(Duration::from_millis(self.cap_ms));
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "Transient provider error, retrying"
                    );
                    sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, 1, 2.0, 10, 0.2)
    }

    #[test]
    fn test_backoff_source_bounds() {
        let policy = RetryPolicy::default();
        let mut source = policy.backoff_source();

        // First interval is 500ms ± 20% jitter.
        let first = source.next_backoff().unwrap();
        assert!(first >= Duration::from_millis(400));
        assert!(first <= Duration::from_millis(600));

        // Never exceeds the cap (with jitter headroom).
        for _ in 0..20 {
            if let Some(wait) = source.next_backoff() {
                assert!(wait <= Duration::from_millis(36_000));
            }
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let policy = fast_policy(3);
        let calls = Arc::new(AtomicU32::new(0));

        let result = policy
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let policy = fast_policy(3);
        let calls = Arc::new(AtomicU32::new(0));

        let result = policy
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(ProviderError::RateLimited)
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let policy = fast_policy(3);
        let calls = Arc::new(AtomicU32::new(0));

        let result: ProviderResult<()> = policy
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ProviderError::InvalidApiKey)
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let policy = fast_policy(2);
        let calls = Arc::new(AtomicU32::new(0));

        let result: ProviderResult<()> = policy
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ProviderError::ServerError(503, "overloaded".to_string()))
                }
            })
            .await;

        assert!(result.is_err());
        // Initial attempt + 2 retries.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
