//! Error body returned by the IdentityNow API
//!
//! Every non-2xx response from both the token endpoint and the resource
//! endpoints carries the same shape:
//!
//! ```json
//! {"detailCode":"400.1 Bad Request Content","messages":[{"locale":"en-US","localeOrigin":"DEFAULT","text":"bad filter"}]}
//! ```

use serde::Deserialize;

/// A single localized message inside an [`ErrorEnvelope`].
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessage {
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub locale_origin: Option<String>,
    #[serde(default)]
    pub text: String,
}

/// The service's error body.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub detail_code: Option<String>,
    #[serde(default)]
    pub messages: Vec<ErrorMessage>,
}

impl ErrorEnvelope {
    /// Decode an envelope from a raw response body.
    ///
    /// Returns `None` for empty or non-envelope bodies (HTML error pages,
    /// plain text from a load balancer).
    pub fn parse(body: &[u8]) -> Option<Self> {
        if body.is_empty() {
            return None;
        }
        serde_json::from_slice(body).ok()
    }

    /// The canonical human-readable message: the first message's text.
    pub fn first_message(&self) -> Option<&str> {
        self.messages
            .first()
            .map(|m| m.text.as_str())
            .filter(|t| !t.is_empty())
    }
}
