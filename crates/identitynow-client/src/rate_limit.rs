//! Per-client request rate limiting
//!
//! A token bucket with capacity 1, refilled at the configured rate. Each
//! pooled client owns one, so a pool of N clients can reach N times the
//! configured rate in aggregate.

use std::num::NonZeroU32;

use governor::{DefaultDirectRateLimiter, Quota};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

pub struct RateLimiter {
    bucket: DefaultDirectRateLimiter,
    per_second: NonZeroU32,
}

impl RateLimiter {
    pub fn per_second(per_second: NonZeroU32) -> Self {
        let quota = Quota::per_second(per_second).allow_burst(NonZeroU32::MIN);
        Self {
            bucket: governor::RateLimiter::direct(quota),
            per_second,
        }
    }

    /// Wait for a permit, or fail with `RateLimiterCancelled` once `cancel` fires.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::RateLimiterCancelled),
            _ = self.bucket.until_ready() => Ok(()),
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("per_second", &self.per_second)
            .finish()
    }
}
