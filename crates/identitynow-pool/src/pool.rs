//! Pool state and round-robin client selection
//!
//! One `tokio::sync::Mutex` guards the slot list and the cursor. It is held
//! across the token exchange when a slot needs one, so callers routed to a
//! slot that is refreshing wait for it. Rate limiting and the HTTP call run
//! on the returned [`Client`] after the lock is released.

use std::sync::Arc;

use identitynow_auth::{Credential, TokenIssuer};
use identitynow_client::{Client, ClientOptions};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::error::{Error, Result};

struct PoolEntry {
    credential_index: usize,
    client: Client,
}

struct PoolState {
    size: usize,
    /// `size` slots, `None` until first used.
    entries: Vec<Option<PoolEntry>>,
    cursor: usize,
}

impl PoolState {
    fn new(size: usize) -> Self {
        let mut state = Self {
            size,
            entries: Vec::new(),
            cursor: 0,
        };
        state.clear();
        state
    }

    fn clear(&mut self) {
        self.entries = (0..self.size).map(|_| None).collect();
        self.cursor = 0;
    }
}

/// Read-only snapshot for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub pool_size: usize,
    pub active_entries: usize,
    pub valid_tokens: usize,
    pub cursor: usize,
}

/// Round-robin pool of clients over an ordered credential list.
pub struct ClientPool {
    state: Mutex<PoolState>,
    config: PoolConfig,
    credentials: Vec<Credential>,
    client_options: ClientOptions,
    http: reqwest::Client,
    issuer: Arc<dyn TokenIssuer>,
}

impl ClientPool {
    /// Create an empty pool. Slots are filled on demand by [`Self::acquire`].
    ///
    /// `client_options.requests_per_second` is replaced by the pool's
    /// `rate_per_second` so every entry gets the same limiter rate.
    pub fn new(
        config: PoolConfig,
        credentials: Vec<Credential>,
        mut client_options: ClientOptions,
        http: reqwest::Client,
        issuer: Arc<dyn TokenIssuer>,
    ) -> Result<Self> {
        if credentials.is_empty() {
            return Err(Error::NoCredentials);
        }
        config.validate()?;
        client_options.requests_per_second = config.rate_per_second;

        let size = config.effective_size();
        info!(
            pool_size = size,
            max_size = config.max_size,
            credentials = credentials.len(),
            requests_per_second = config.rate_per_second.get(),
            "client pool initialized"
        );
        Ok(Self {
            state: Mutex::new(PoolState::new(size)),
            config,
            credentials,
            client_options,
            http,
            issuer,
        })
    }

    /// Next client in round-robin order, with a token valid at return time.
    ///
    /// The cursor advances on every call, including calls whose refresh
    /// fails. A failed refresh keeps the slot's entry so the next acquire
    /// landing on it retries.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<Client> {
        let mut state = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            state = self.state.lock() => state,
        };

        let slot = state.cursor;
        state.cursor = (state.cursor + 1) % state.size;

        let entry = state.entries[slot].get_or_insert_with(|| {
            let credential_index = slot % self.credentials.len();
            debug!(slot, credential_index, "creating pool entry");
            PoolEntry {
                credential_index,
                client: Client::new(
                    self.client_options.clone(),
                    self.credentials[credential_index].clone(),
                    self.http.clone(),
                    Arc::clone(&self.issuer),
                ),
            }
        });

        match entry.client.ensure_token(cancel).await {
            Ok(_) => {
                debug!(slot, client_id = %entry.client.client_id(), "client acquired");
                Ok(entry.client.clone())
            }
            Err(identitynow_client::Error::Cancelled) => Err(Error::Cancelled),
            Err(source) => {
                warn!(
                    slot,
                    credential_index = entry.credential_index,
                    error = %source,
                    "pool entry refresh failed"
                );
                Err(Error::Refresh {
                    credential_index: entry.credential_index,
                    source,
                })
            }
        }
    }

    /// Drop every entry and rewind the cursor.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.clear();
        info!(pool_size = state.size, "client pool reset");
    }

    /// Resize to `n` clamped to `[1, max_size]` and reset. Returns the new size.
    pub async fn set_pool_size(&self, n: usize) -> usize {
        let size = PoolConfig::clamp_size(n, self.config.max_size);
        let mut state = self.state.lock().await;
        let previous = state.size;
        state.size = size;
        state.clear();
        info!(requested = n, previous, pool_size = size, "client pool resized");
        size
    }

    pub async fn stats(&self) -> PoolStats {
        let state = self.state.lock().await;
        let mut active_entries = 0;
        let mut valid_tokens = 0;
        for entry in state.entries.iter().flatten() {
            active_entries += 1;
            if entry.client.has_valid_token().await {
                valid_tokens += 1;
            }
        }
        PoolStats {
            pool_size: state.size,
            active_entries,
            valid_tokens,
            cursor: state.cursor,
        }
    }
}

impl std::fmt::Debug for ClientPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientPool")
            .field("config", &self.config)
            .field("credentials", &self.credentials.len())
            .finish()
    }
}
