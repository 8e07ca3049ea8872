//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Client secrets are read from `client_secret_file` or, for the single
//! env-supplied credential, `IDENTITYNOW_CLIENT_SECRET`. They are never
//! stored in the TOML directly.

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use common::Secret;
use identitynow_auth::Credential;
use identitynow_pool::PoolConfig;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "identitynow-probe.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub pool: PoolSection,
    #[serde(default)]
    pub credentials: Vec<CredentialConfig>,
}

/// Tenant API settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    /// Tenant API root, e.g. `https://acme.api.identitynow.com`
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Pool sizing and per-client rate
#[derive(Debug, Deserialize)]
pub struct PoolSection {
    #[serde(default = "default_pool_size")]
    pub max_size: usize,
    #[serde(default = "default_pool_size")]
    pub default_size: usize,
    #[serde(default = "default_rate")]
    pub requests_per_second: u32,
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            max_size: default_pool_size(),
            default_size: default_pool_size(),
            requests_per_second: default_rate(),
        }
    }
}

/// One API client credential
#[derive(Debug, Deserialize)]
pub struct CredentialConfig {
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file holding the client secret
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
}

fn default_timeout() -> u64 {
    identitynow_auth::DEFAULT_HTTP_TIMEOUT.as_secs()
}

fn default_pool_size() -> usize {
    1
}

fn default_rate() -> u32 {
    10
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.finish(env_var)
    }

    /// Defaults plus environment variables, for running without a file.
    pub fn from_env() -> Result<Self> {
        Config::default().finish(env_var)
    }

    fn finish(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        self.apply_overrides(&lookup)?;
        self.resolve_secrets(&lookup)?;
        self.validate()?;
        Ok(self)
    }

    /// Overlay `IDENTITYNOW_*` variables onto file values.
    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("IDENTITYNOW_URL") {
            self.api.url = url;
        }
        if let Some(n) = parse_var(lookup, "IDENTITYNOW_MAX_POOL_SIZE")? {
            self.pool.max_size = n;
        }
        if let Some(n) = parse_var(lookup, "IDENTITYNOW_DEF_POOL_SIZE")? {
            self.pool.default_size = n;
        }
        if let Some(n) = parse_var(lookup, "IDENTITYNOW_CLI_RQ_RATE")? {
            self.pool.requests_per_second = n;
        }
        Ok(())
    }

    /// Read secret files, or form the single env credential when none are listed.
    fn resolve_secrets(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<()> {
        if self.credentials.is_empty() {
            if let (Some(client_id), Some(secret)) = (
                lookup("IDENTITYNOW_CLIENT_ID"),
                lookup("IDENTITYNOW_CLIENT_SECRET"),
            ) {
                self.credentials.push(CredentialConfig {
                    client_id,
                    client_secret: Some(Secret::new(secret)),
                    client_secret_file: None,
                });
            }
            return Ok(());
        }

        for credential in &mut self.credentials {
            let Some(ref file) = credential.client_secret_file else {
                continue;
            };
            let secret =
                std::fs::read_to_string(file).map_err(|source| ConfigError::SecretFile {
                    client_id: credential.client_id.clone(),
                    path: file.clone(),
                    source,
                })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                credential.client_secret = Some(Secret::new(secret));
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !self.api.url.starts_with("http://") && !self.api.url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "api.url must start with http:// or https://, got: {:?}",
                self.api.url
            )));
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        if self.pool.requests_per_second == 0 {
            return Err(ConfigError::Invalid(
                "requests_per_second must be greater than 0".into(),
            ));
        }
        if self.pool.max_size == 0 {
            return Err(ConfigError::Invalid(
                "max_size must be at least 1".into(),
            ));
        }
        if self.credentials.is_empty() {
            return Err(ConfigError::Invalid(
                "no credentials configured: add [[credentials]] or set IDENTITYNOW_CLIENT_ID and IDENTITYNOW_CLIENT_SECRET".into(),
            ));
        }
        for credential in &self.credentials {
            if credential.client_id.is_empty() {
                return Err(ConfigError::Invalid("client_id must not be empty".into()));
            }
            if credential.client_secret.as_ref().is_none_or(|s| s.is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "credential {} has no client secret",
                    credential.client_id
                )));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    /// Pool settings, with `requested_size` from the command line if given.
    pub fn pool_config(&self, requested_size: Option<usize>) -> PoolConfig {
        PoolConfig {
            requested_size,
            max_size: self.pool.max_size,
            default_size: self.pool.default_size,
            rate_per_second: NonZeroU32::new(self.pool.requests_per_second)
                .unwrap_or(identitynow_client::DEFAULT_REQUESTS_PER_SECOND),
        }
    }

    /// Credentials in configuration order. Validation guarantees a secret for each.
    pub fn pool_credentials(&self) -> Vec<Credential> {
        self.credentials
            .iter()
            .filter_map(|c| {
                c.client_secret
                    .clone()
                    .map(|secret| Credential::new(c.client_id.clone(), secret))
            })
            .collect()
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidVar { key, value: raw }),
    }
}
