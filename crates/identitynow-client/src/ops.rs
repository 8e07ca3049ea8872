//! Typed resource operations
//!
//! Thin wrappers over [`Client::execute`] for the verbs the service exposes.
//! Retry follows the HTTP method (see [`ApiRequest::is_idempotent`]).

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::patch::PatchOperation;
use crate::request::ApiRequest;

/// Largest page the list endpoints accept.
pub const MAX_PAGE_SIZE: usize = 250;

/// Result of [`Client::delete_idempotent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The object was already gone (404).
    AlreadyAbsent,
}

impl Client {
    /// Execute a request and require a decoded body.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<T> {
        self.execute(request, cancel).await?.into_body()
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<T> {
        self.fetch(&ApiRequest::get(path), cancel).await
    }

    /// One page of a collection.
    pub async fn list<T: DeserializeOwned>(
        &self,
        path: &str,
        limit: usize,
        offset: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<T>> {
        let request = ApiRequest::get(path)
            .query("limit", limit)
            .query("offset", offset);
        self.fetch(&request, cancel).await
    }

    /// Every item of a collection, fetched page by page.
    ///
    /// `request` carries the path and any filters; `limit`/`offset` are
    /// appended per page. Stops at the first page shorter than `page_size`.
    pub async fn list_all<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        page_size: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<T>> {
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(Error::InvalidRequest(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"
            )));
        }

        let mut items = Vec::new();
        let mut offset = 0;
        loop {
            let page_request = request
                .clone()
                .query("limit", page_size)
                .query("offset", offset);
            let page: Vec<T> = self.fetch(&page_request, cancel).await?;
            let fetched = page.len();
            items.extend(page);
            debug!(path = %request.path(), offset, fetched, "fetched page");
            if fetched < page_size {
                return Ok(items);
            }
            offset += fetched;
        }
    }

    /// POST a new object. Runs once; a 429 is returned, not retried.
    pub async fn create<B, T>(&self, path: &str, body: &B, cancel: &CancellationToken) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = ApiRequest::post(path).json(body)?;
        self.fetch(&request, cancel).await
    }

    /// PUT a full replacement.
    pub async fn update<B, T>(&self, path: &str, body: &B, cancel: &CancellationToken) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = ApiRequest::put(path).json(body)?;
        self.fetch(&request, cancel).await
    }

    /// PATCH with a JSON Patch document. Runs once.
    pub async fn patch<T: DeserializeOwned>(
        &self,
        path: &str,
        operations: Vec<PatchOperation>,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let request = ApiRequest::patch(path).json_patch(operations);
        self.fetch(&request, cancel).await
    }

    /// DELETE; any response body is discarded.
    pub async fn delete(&self, path: &str, cancel: &CancellationToken) -> Result<()> {
        self.execute::<IgnoredAny>(&ApiRequest::delete(path), cancel)
            .await
            .map(|_| ())
    }

    /// DELETE that treats an absent object as success.
    pub async fn delete_idempotent(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<DeleteOutcome> {
        match self.delete(path, cancel).await {
            Ok(()) => Ok(DeleteOutcome::Deleted),
            Err(Error::NotFound) => {
                debug!(path, "object already absent");
                Ok(DeleteOutcome::AlreadyAbsent)
            }
            Err(e) => Err(e),
        }
    }
}
