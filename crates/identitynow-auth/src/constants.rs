//! IdentityNow OAuth constants

use std::time::Duration;

/// Token endpoint path, relative to the tenant API base URL
pub const TOKEN_PATH: &str = "/oauth/token";

/// OAuth2 grant used for machine-to-machine access
pub const GRANT_TYPE: &str = "client_credentials";

/// Accept header sent on every call to the service
pub const ACCEPT_JSON: &str = "application/json; charset=utf-8";

/// Subtracted from the issuer's `expires_in` so a token never expires mid-request.
pub const SAFETY_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Lifetime assumed when `expires_in` is missing, non-positive, or not
/// larger than [`SAFETY_MARGIN`].
pub const FALLBACK_LIFETIME: Duration = Duration::from_secs(60 * 60);

/// Upper bound on a token's usable lifetime, whatever `expires_in` claims.
pub const MAX_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Overall timeout for a single HTTP request to the service.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);
