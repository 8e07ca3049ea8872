//! Error taxonomy for API calls

/// Fixed text for 404 responses. The service's own message is ignored.
pub const NOT_FOUND_MESSAGE: &str = "resource not found (404)";

/// Errors from a request to the IdentityNow API.
///
/// `NotFound` is an expected outcome rather than a fault: callers use
/// [`NotFoundExt::found`] to read it as "no result" and
/// [`crate::Client::delete_idempotent`] to make deletes of absent objects
/// succeed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("resource not found (404)")]
    NotFound,

    #[error("rate limit exceeded (429)")]
    RateLimited,

    #[error("Gateway Timeout error (504)")]
    GatewayTimeout,

    /// Any other non-success status. `message` is the envelope's first
    /// message, or "unknown error, status code: N".
    #[error("{message}")]
    Generic { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),

    /// The caller cancelled while waiting on this client's rate limiter.
    #[error("rate limiter wait cancelled")]
    RateLimiterCancelled,

    /// The caller cancelled during the HTTP call, a token refresh, or a
    /// retry backoff.
    #[error("request cancelled")]
    Cancelled,

    #[error("token refresh failed: {0}")]
    Token(#[from] identitynow_auth::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("expected a response body, got 204 No Content")]
    MissingBody,
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }

    /// Transient classifications that a [`crate::RetryPolicy`] retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RateLimited | Error::GatewayTimeout)
    }

    /// HTTP status behind a classified response error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::NotFound => Some(404),
            Error::RateLimited => Some(429),
            Error::GatewayTimeout => Some(504),
            Error::Generic { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Low-cardinality label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound => "not_found",
            Error::RateLimited => "rate_limited",
            Error::GatewayTimeout => "gateway_timeout",
            Error::Generic { .. } => "api_error",
            Error::Transport(_) => "transport",
            Error::Decode(_) => "decode",
            Error::RateLimiterCancelled => "rate_limiter_cancelled",
            Error::Cancelled => "cancelled",
            Error::Token(_) => "token",
            Error::InvalidRequest(_) => "invalid_request",
            Error::MissingBody => "missing_body",
        }
    }
}

/// Result alias for API calls.
pub type Result<T> = std::result::Result<T, Error>;

/// Treat "object absent" as a normal outcome.
pub trait NotFoundExt<T> {
    /// `Err(NotFound)` becomes `Ok(None)`; every other error is kept.
    fn found(self) -> Result<Option<T>>;
}

impl<T> NotFoundExt<T> for Result<T> {
    fn found(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(Error::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
