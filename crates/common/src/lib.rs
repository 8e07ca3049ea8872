//! Common types shared by the IdentityNow client crates

mod envelope;
mod secret;

pub use envelope::{ErrorEnvelope, ErrorMessage};
pub use secret::Secret;
