//! Bounded retry for idempotent calls
//!
//! Linear backoff: after failed attempt `n` (1-indexed) the policy sleeps
//! `n * step`, so the default policy waits 3s, then 6s. Only `RateLimited`
//! and `GatewayTimeout` are retried; every other outcome returns at once.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{Error, Result};
use crate::metrics;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_STEP: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BACKOFF_STEP)
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the first try; values below 1 are raised to 1.
    pub fn new(max_attempts: u32, step: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            step,
        }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Sleep after failed attempt `attempt` (1-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or `max_attempts` is used up (the last error is returned).
    ///
    /// A cancelled backoff sleep ends the loop with `Cancelled`.
    pub async fn with_retry<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_secs = delay.as_secs_f64(),
                        error = %err,
                        "transient API error, backing off"
                    );
                    metrics::record_retry(err.kind());
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(Error::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn generic(status: u16) -> Error {
        Error::Generic {
            status,
            message: format!("unknown error, status code: {status}"),
        }
    }

    #[test]
    fn linear_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay_for(1), Duration::from_secs(3));
        assert_eq!(policy.delay_for(2), Duration::from_secs(6));
    }

    #[test]
    fn zero_attempts_is_raised_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::from_secs(1)).max_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt_after_3s_then_6s() {
        let mut outcomes = vec![Err(Error::RateLimited), Err(Error::RateLimited), Ok(200u16)].into_iter();
        let mut stamps = Vec::new();
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let result = RetryPolicy::default()
            .with_retry(&cancel, || {
                stamps.push(Instant::now());
                let outcome = outcomes.next().unwrap();
                async move { outcome }
            })
            .await;

        assert_eq!(result.unwrap(), 200);
        assert_eq!(stamps.len(), 3);
        assert_eq!(stamps[1] - stamps[0], Duration::from_secs(3));
        assert_eq!(stamps[2] - stamps[1], Duration::from_secs(6));
        assert_eq!(start.elapsed(), Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_fails_immediately() {
        let mut calls = 0;
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let result: Result<()> = RetryPolicy::default()
            .with_retry(&cancel, || {
                calls += 1;
                async { Err(generic(500)) }
            })
            .await;

        assert!(matches!(result, Err(Error::Generic { status: 500, .. })));
        assert_eq!(calls, 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_attempts_returns_last_error() {
        let mut outcomes = vec![Err(Error::RateLimited), Err(Error::GatewayTimeout), Err(Error::GatewayTimeout)].into_iter();
        let mut calls = 0;
        let cancel = CancellationToken::new();

        let result: Result<()> = RetryPolicy::default()
            .with_retry(&cancel, || {
                calls += 1;
                let outcome = outcomes.next().unwrap();
                async move { outcome }
            })
            .await;

        assert!(matches!(result, Err(Error::GatewayTimeout)));
        assert_eq!(calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_is_not_retried() {
        let mut calls = 0;
        let cancel = CancellationToken::new();

        let result: Result<()> = RetryPolicy::default()
            .with_retry(&cancel, || {
                calls += 1;
                async { Err(Error::NotFound) }
            })
            .await;

        assert!(result.unwrap_err().is_not_found());
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let result: Result<()> = RetryPolicy::default()
            .with_retry(&cancel, || async { Err(Error::RateLimited) })
            .await;

        assert!(matches!(result, Err(Error::Cancelled)), "got: {result:?}");
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn none_policy_never_sleeps() {
        let mut calls = 0;
        let cancel = CancellationToken::new();
        let result: Result<()> = RetryPolicy::none()
            .with_retry(&cancel, || {
                calls += 1;
                async { Err(Error::RateLimited) }
            })
            .await;
        assert!(matches!(result, Err(Error::RateLimited)));
        assert_eq!(calls, 1);
    }
}
