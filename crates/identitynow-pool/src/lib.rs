//! Round-robin pool of credentialed IdentityNow clients
//!
//! The pool owns up to `max_size` [`identitynow_client::Client`] entries, one
//! per slot, each bound to `credentials[slot % credentials.len()]`. Entries
//! are created lazily on first use and kept until the pool is reset.
//!
//! Acquire lifecycle:
//! 1. Caller calls [`ClientPool::acquire`]
//! 2. The pool lock is taken and the cursor advances one slot
//! 3. An empty slot gets a new client; an expired token is re-issued in place
//! 4. The ready client is returned; rate limiting and I/O happen outside the lock

pub mod config;
pub mod error;
pub mod pool;

pub use config::PoolConfig;
pub use error::{Error, Result};
pub use pool::{ClientPool, PoolStats};
