//! Configuration errors

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The path is reported, never the contents.
    #[error("failed to read client_secret_file {} for {client_id}", path.display())]
    SecretFile {
        client_id: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{key} must be a non-negative integer, got: {value}")]
    InvalidVar { key: &'static str, value: String },

    #[error("{0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
