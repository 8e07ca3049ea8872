//! Request and reply envelopes

use reqwest::Method;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::patch::PatchOperation;

/// Header some beta endpoints require before they will answer.
pub const EXPERIMENTAL_HEADER: &str = "X-SailPoint-Experimental";

pub const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";
pub const CONTENT_TYPE_JSON_PATCH: &str = "application/json-patch+json; charset=utf-8";

#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(serde_json::Value),
    JsonPatch(Vec<PatchOperation>),
}

/// One call against a versioned resource path, e.g. `GET /v3/sources/{id}`.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) body: Option<RequestBody>,
    pub(crate) experimental: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            experimental: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter (percent-encoded when the URL is built).
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Attach a JSON body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| Error::InvalidRequest(format!("request body: {e}")))?;
        self.body = Some(RequestBody::Json(value));
        Ok(self)
    }

    /// Attach a JSON Patch document.
    pub fn json_patch(mut self, operations: Vec<PatchOperation>) -> Self {
        self.body = Some(RequestBody::JsonPatch(operations));
        self
    }

    /// Send `X-SailPoint-Experimental: true`.
    pub fn experimental(mut self) -> Self {
        self.experimental = true;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// GET, HEAD, PUT and DELETE may be repeated safely and therefore run
    /// under the client's retry policy. POST and PATCH run exactly once.
    pub fn is_idempotent(&self) -> bool {
        matches!(
            self.method,
            Method::GET | Method::HEAD | Method::PUT | Method::DELETE
        )
    }

    /// Body bytes and their content type.
    pub(crate) fn encoded_body(&self) -> Result<Option<(Vec<u8>, &'static str)>> {
        let encoded = match &self.body {
            None => return Ok(None),
            Some(RequestBody::Json(value)) => (serde_json::to_vec(value), CONTENT_TYPE_JSON),
            Some(RequestBody::JsonPatch(ops)) => (serde_json::to_vec(ops), CONTENT_TYPE_JSON_PATCH),
        };
        match encoded {
            (Ok(bytes), content_type) => Ok(Some((bytes, content_type))),
            (Err(e), _) => Err(Error::InvalidRequest(format!("request body: {e}"))),
        }
    }
}

/// Decoded result of a successful call.
///
/// `NoContent` is only produced for a DELETE answered with an empty 204.
/// Callers that do not use the result can decode into
/// [`serde::de::IgnoredAny`].
#[derive(Debug, Clone, PartialEq)]
pub enum Reply<T> {
    Json(T),
    NoContent,
}

impl<T> Reply<T> {
    pub fn into_body(self) -> Result<T> {
        match self {
            Reply::Json(body) => Ok(body),
            Reply::NoContent => Err(Error::MissingBody),
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Reply::Json(body) => Some(body),
            Reply::NoContent => None,
        }
    }
}
