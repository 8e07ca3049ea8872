//! IdentityNow API client
//!
//! One [`Client`] per credential. Each owns a bearer token slot, a
//! one-permit token bucket and a retry policy, and shares a `reqwest::Client`
//! with its siblings.
//!
//! Request flow:
//! 1. Caller builds an [`ApiRequest`] (or uses a typed operation such as
//!    [`Client::get`] or [`Client::list_all`])
//! 2. [`Client::execute`] runs it once, or under [`RetryPolicy`] when the
//!    method is idempotent
//! 3. Each attempt waits on the [`RateLimiter`], re-issues the token if it
//!    has expired, then sends
//! 4. The status is classified into [`Error`]; success decodes into
//!    [`Reply`]

pub mod classify;
pub mod client;
pub mod error;
pub mod metrics;
pub mod ops;
pub mod patch;
pub mod rate_limit;
pub mod request;
pub mod retry;

pub use classify::classify_status;
pub use client::{Client, ClientOptions, DEFAULT_REQUESTS_PER_SECOND, build_http_client};
pub use error::{Error, NOT_FOUND_MESSAGE, NotFoundExt, Result};
pub use ops::{DeleteOutcome, MAX_PAGE_SIZE};
pub use patch::{PatchField, PatchOp, PatchOperation, Patchable, build_patch, non_empty};
pub use rate_limit::RateLimiter;
pub use request::{ApiRequest, Reply};
pub use retry::RetryPolicy;

// Re-exported so callers need not depend on the auth crate directly.
pub use identitynow_auth::{Credential, OAuthTokenIssuer, Token, TokenIssuer};
pub use tokio_util::sync::CancellationToken;
