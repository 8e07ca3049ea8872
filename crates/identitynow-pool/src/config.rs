//! Pool sizing

use std::num::NonZeroU32;

use identitynow_client::DEFAULT_REQUESTS_PER_SECOND;

use crate::error::{Error, Result};

pub const DEFAULT_MAX_SIZE: usize = 1;
pub const DEFAULT_SIZE: usize = 1;

/// Sizing and per-client rate for a [`crate::ClientPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Size asked for by the caller; `None` or `Some(0)` means `default_size`.
    pub requested_size: Option<usize>,
    pub max_size: usize,
    pub default_size: usize,
    /// Refill rate of each entry's own limiter.
    pub rate_per_second: NonZeroU32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            requested_size: None,
            max_size: DEFAULT_MAX_SIZE,
            default_size: DEFAULT_SIZE,
            rate_per_second: DEFAULT_REQUESTS_PER_SECOND,
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(Error::InvalidConfig("max_size must be at least 1".into()));
        }
        Ok(())
    }

    /// `requested_size` (or `default_size`) clamped to `[1, max_size]`.
    pub fn effective_size(&self) -> usize {
        let requested = self
            .requested_size
            .filter(|&n| n > 0)
            .unwrap_or(self.default_size);
        Self::clamp_size(requested, self.max_size)
    }

    pub(crate) fn clamp_size(n: usize, max_size: usize) -> usize {
        n.min(max_size).max(1)
    }
}
