//! IdentityNow OAuth client-credentials authentication
//!
//! Exchanges one `{client_id, client_secret}` pair for a bearer token and
//! tracks when that token stops being usable. This crate knows nothing about
//! pools or resource requests; the client and pool crates drive it through
//! the [`TokenIssuer`] trait.
//!
//! Token flow:
//! 1. Caller builds a [`Credential`] from configuration
//! 2. [`OAuthTokenIssuer::request_token`] POSTs the client-credentials grant
//! 3. The response's `expires_in` becomes an absolute [`Token`] expiry, minus
//!    a five minute safety margin
//! 4. Callers check [`Token::is_valid`] before each use and re-issue on expiry

pub mod constants;
pub mod credentials;
pub mod error;
pub mod issuer;
pub mod token;

pub use constants::*;
pub use credentials::Credential;
pub use error::{Error, Result};
pub use issuer::{IssueFuture, OAuthTokenIssuer, TokenIssuer};
pub use token::{Token, TokenResponse};
