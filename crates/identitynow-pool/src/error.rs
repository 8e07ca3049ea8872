//! Error types for pool operations

/// Errors from pool operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("client pool requires at least one credential")]
    NoCredentials,

    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),

    /// Token issuance for the selected slot failed. The entry is kept and
    /// the next acquire that lands on it retries.
    #[error("failed to refresh token for pool entry {credential_index}: {source}")]
    Refresh {
        credential_index: usize,
        #[source]
        source: identitynow_client::Error,
    },

    #[error("acquire cancelled")]
    Cancelled,
}

/// Result alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;
