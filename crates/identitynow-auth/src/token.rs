//! Bearer tokens and their expiry
//!
//! The token endpoint reports `expires_in` as a delta in seconds from the
//! response time. A [`Token`] turns that delta into an absolute `Instant`,
//! trimmed by [`SAFETY_MARGIN`] so callers stop using a token before the
//! service does.

use std::fmt;
use std::time::{Duration, Instant};

use common::Secret;
use serde::Deserialize;

use crate::constants::{FALLBACK_LIFETIME, MAX_LIFETIME, SAFETY_MARGIN};

/// Body of a successful client-credentials exchange.
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Seconds until the access token expires (delta, not absolute)
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// An access token and the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct Token {
    access_token: Secret<String>,
    issued_at: Instant,
    expiry: Instant,
}

impl Token {
    /// Build a token from the issuer's response fields.
    pub fn new(access_token: impl Into<String>, expires_in: Option<i64>, issued_at: Instant) -> Self {
        let expiry = issued_at
            .checked_add(Self::lifetime(expires_in))
            .unwrap_or(issued_at);
        Self {
            access_token: Secret::new(access_token.into()),
            issued_at,
            expiry,
        }
    }

    /// Build a token whose expiry is already known as an absolute instant.
    pub fn with_expiry(access_token: impl Into<String>, issued_at: Instant, expiry: Instant) -> Self {
        Self {
            access_token: Secret::new(access_token.into()),
            issued_at,
            expiry,
        }
    }

    /// How long a token issued with `expires_in` seconds remains usable.
    ///
    /// `expires_in - 5m` when the issuer grants more than five minutes,
    /// otherwise a flat hour. Never more than [`MAX_LIFETIME`].
    pub fn lifetime(expires_in: Option<i64>) -> Duration {
        match expires_in {
            Some(secs) if secs > 0 => {
                let granted = Duration::from_secs(secs.unsigned_abs());
                if granted > SAFETY_MARGIN {
                    (granted - SAFETY_MARGIN).min(MAX_LIFETIME)
                } else {
                    FALLBACK_LIFETIME
                }
            }
            _ => FALLBACK_LIFETIME,
        }
    }

    /// The bearer value for the `Authorization` header.
    pub fn access_token(&self) -> &str {
        self.access_token.expose()
    }

    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }

    pub fn expiry(&self) -> Instant {
        self.expiry
    }

    /// Whether the token is still usable right now.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Instant::now())
    }

    pub fn is_valid_at(&self, now: Instant) -> bool {
        now < self.expiry
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.expiry.saturating_duration_since(Instant::now())
    }
}
