//! Error types for token acquisition

/// Errors from the client-credentials exchange.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure (DNS, refused connection, timeout). The URL is
    /// stripped before wrapping because it carries the client secret.
    #[error("token request failed: {0}")]
    Http(#[source] reqwest::Error),

    /// The token endpoint answered with a non-2xx status.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("invalid token response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("access token is empty in token response")]
    EmptyToken,

    #[error("invalid token endpoint: {0}")]
    InvalidUrl(String),
}

impl Error {
    /// HTTP status of a rejected exchange, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
