//! Response classification
//!
//! Maps an HTTP status and raw body to the error taxonomy. The three
//! statuses callers branch on (404, 429, 504) get fixed errors whatever the
//! body says; everything else outside 200-399 becomes `Generic` carrying the
//! service's own message when it sent an envelope.

use common::ErrorEnvelope;

use crate::error::Error;

/// Classify a response. `None` means success.
pub fn classify_status(status: u16, body: &[u8]) -> Option<Error> {
    match status {
        200..=399 => None,
        404 => Some(Error::NotFound),
        429 => Some(Error::RateLimited),
        504 => Some(Error::GatewayTimeout),
        _ => {
            let message = ErrorEnvelope::parse(body)
                .and_then(|env| env.first_message().map(str::to_owned))
                .unwrap_or_else(|| format!("unknown error, status code: {status}"));
            Some(Error::Generic { status, message })
        }
    }
}
