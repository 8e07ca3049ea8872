//! Client credential pairs

use common::Secret;

/// One API client registered with the tenant.
///
/// Immutable once built from configuration. The secret is wrapped so that
/// `Debug` output (and therefore any `?credential` logging field) prints
/// `[REDACTED]`.
#[derive(Debug, Clone)]
pub struct Credential {
    pub client_id: String,
    pub client_secret: Secret<String>,
}

impl Credential {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<Secret<String>>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}
