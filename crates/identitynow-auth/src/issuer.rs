//! Client-credentials token exchange
//!
//! `POST <base>/oauth/token?grant_type=client_credentials&client_id=..&client_secret=..`
//! with no body and no prior Authorization header. Failures are returned as-is;
//! this module never retries.

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use common::ErrorEnvelope;
use reqwest::header::ACCEPT;
use tracing::{debug, info, warn};

use crate::constants::{ACCEPT_JSON, GRANT_TYPE, TOKEN_PATH};
use crate::credentials::Credential;
use crate::error::{Error, Result};
use crate::token::{Token, TokenResponse};

/// Boxed future returned by [`TokenIssuer::issue`].
pub type IssueFuture<'a> = Pin<Box<dyn Future<Output = Result<Token>> + Send + 'a>>;

/// Source of fresh tokens for a credential.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn TokenIssuer>`), so tests can substitute an in-memory issuer.
pub trait TokenIssuer: Send + Sync {
    fn issue<'a>(&'a self, credential: &'a Credential) -> IssueFuture<'a>;
}

/// Issues tokens from the tenant's OAuth endpoint.
#[derive(Debug, Clone)]
pub struct OAuthTokenIssuer {
    http: reqwest::Client,
    token_url: String,
}

impl OAuthTokenIssuer {
    /// `base_url` is the tenant API root, e.g. `https://acme.api.identitynow.com`.
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            token_url: format!("{}{TOKEN_PATH}", base_url.trim_end_matches('/')),
        }
    }

    /// Token endpoint without the credential query string (safe to log).
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Perform one client-credentials exchange.
    pub async fn request_token(&self, credential: &Credential) -> Result<Token> {
        info!(
            token_url = %self.token_url,
            client_id = %credential.client_id,
            "obtaining OAuth token"
        );

        let url = reqwest::Url::parse_with_params(
            &self.token_url,
            &[
                ("grant_type", GRANT_TYPE),
                ("client_id", credential.client_id.as_str()),
                ("client_secret", credential.client_secret.expose().as_str()),
            ],
        )
        .map_err(|e| Error::InvalidUrl(format!("{}: {e}", self.token_url)))?;

        // Strip the URL from transport errors: it carries the secret.
        let response = self
            .http
            .post(url)
            .header(ACCEPT, ACCEPT_JSON)
            .send()
            .await
            .map_err(|e| Error::Http(e.without_url()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Http(e.without_url()))?;
        let issued_at = Instant::now();

        if !status.is_success() {
            let message = ErrorEnvelope::parse(&body)
                .and_then(|env| env.first_message().map(str::to_owned))
                .unwrap_or_else(|| format!("failed to get token, status {}", status.as_u16()));
            warn!(
                client_id = %credential.client_id,
                status = status.as_u16(),
                error = %message,
                "token endpoint rejected credentials"
            );
            return Err(Error::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: TokenResponse = serde_json::from_slice(&body).map_err(Error::Decode)?;
        if parsed.access_token.is_empty() {
            return Err(Error::EmptyToken);
        }

        let token = Token::new(parsed.access_token, parsed.expires_in, issued_at);
        debug!(
            client_id = %credential.client_id,
            expires_in = ?parsed.expires_in,
            valid_for_secs = token.remaining().as_secs(),
            "OAuth token obtained"
        );
        Ok(token)
    }
}

impl TokenIssuer for OAuthTokenIssuer {
    fn issue<'a>(&'a self, credential: &'a Credential) -> IssueFuture<'a> {
        Box::pin(self.request_token(credential))
    }
}
