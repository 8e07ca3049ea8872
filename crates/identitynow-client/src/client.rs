//! Authenticated, rate-limited API client
//!
//! A `Client` is one credential's view of the service: its own token, its own
//! rate limiter, a shared `reqwest::Client`. Handles are cheap to clone and
//! all clones share the same token slot, so a refresh performed through one
//! handle (or by the pool) is seen by every other.
//!
//! Send path, in order:
//! 1. Wait on the rate limiter
//! 2. Check the token and re-issue it if it has expired
//! 3. Perform the HTTP call with `Authorization: Bearer <token>`
//! 4. Classify the status
//! 5. Decode the body, except for an empty 204 answer to a DELETE

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use identitynow_auth::{ACCEPT_JSON, Credential, Token, TokenIssuer};
use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::classify::classify_status;
use crate::error::{Error, Result};
use crate::metrics;
use crate::rate_limit::RateLimiter;
use crate::request::{ApiRequest, EXPERIMENTAL_HEADER, Reply};
use crate::retry::RetryPolicy;

/// Default per-client request rate.
pub const DEFAULT_REQUESTS_PER_SECOND: NonZeroU32 = match NonZeroU32::new(10) {
    Some(rate) => rate,
    None => NonZeroU32::MIN,
};

/// Build the shared HTTP client with the service-wide request timeout.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(Error::Transport)
}

/// Settings shared by every client created for one tenant.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,
    pub requests_per_second: NonZeroU32,
    pub retry: RetryPolicy,
}

impl ClientOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            retry: RetryPolicy::default(),
        }
    }
}

struct Inner {
    base_url: String,
    http: reqwest::Client,
    credential: Credential,
    issuer: Arc<dyn TokenIssuer>,
    limiter: RateLimiter,
    retry: RetryPolicy,
    /// `None` until the first successful exchange.
    token: Mutex<Option<Token>>,
}

#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url)
            .field("client_id", &self.inner.credential.client_id)
            .field("limiter", &self.inner.limiter)
            .finish()
    }
}

impl Client {
    /// Create a client with no token yet; the first call (or pool
    /// acquisition) performs the exchange.
    pub fn new(
        options: ClientOptions,
        credential: Credential,
        http: reqwest::Client,
        issuer: Arc<dyn TokenIssuer>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                base_url: options.base_url.trim_end_matches('/').to_owned(),
                http,
                credential,
                issuer,
                limiter: RateLimiter::per_second(options.requests_per_second),
                retry: options.retry,
                token: Mutex::new(None),
            }),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.inner.credential.client_id
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Whether a token has been issued and has not yet expired.
    pub async fn has_valid_token(&self) -> bool {
        self.inner
            .token
            .lock()
            .await
            .as_ref()
            .is_some_and(Token::is_valid)
    }

    pub async fn token_expiry(&self) -> Option<Instant> {
        self.inner.token.lock().await.as_ref().map(Token::expiry)
    }

    /// Return the current token, exchanging credentials first when none has
    /// been issued or the current one has expired.
    ///
    /// The token slot stays locked for the duration of the exchange so
    /// concurrent senders on this client wait for one refresh instead of
    /// each issuing their own. A failed exchange leaves the slot as it was.
    pub async fn ensure_token(&self, cancel: &CancellationToken) -> Result<Token> {
        let mut slot = self.inner.token.lock().await;
        if let Some(token) = slot.as_ref().filter(|t| t.is_valid()) {
            return Ok(token.clone());
        }

        match slot.as_ref() {
            Some(expired) => debug!(
                client_id = %self.client_id(),
                expired_for_secs = Instant::now().saturating_duration_since(expired.expiry()).as_secs(),
                "token expired, refreshing"
            ),
            None => debug!(client_id = %self.client_id(), "issuing first token"),
        }

        let issued = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            issued = self.inner.issuer.issue(&self.inner.credential) => issued,
        };

        match issued {
            Ok(token) => {
                metrics::record_token_refresh("success");
                info!(
                    client_id = %self.client_id(),
                    valid_for_secs = token.remaining().as_secs(),
                    "token refreshed"
                );
                *slot = Some(token.clone());
                Ok(token)
            }
            Err(e) => {
                metrics::record_token_refresh("failure");
                warn!(client_id = %self.client_id(), error = %e, "token refresh failed");
                Err(Error::Token(e))
            }
        }
    }

    /// Perform one request with no retry.
    #[instrument(
        skip_all,
        fields(
            request_id = %uuid::Uuid::new_v4(),
            method = %request.method,
            path = %request.path,
        )
    )]
    pub async fn send<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<Reply<T>> {
        let started = Instant::now();
        let result = self.send_inner(request, cancel).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        metrics::record_request(
            request.method.as_str(),
            outcome,
            started.elapsed().as_secs_f64(),
        );
        result
    }

    /// Perform a request, under the retry policy when it is idempotent.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<Reply<T>> {
        if request.is_idempotent() {
            self.inner
                .retry
                .with_retry(cancel, move || self.send(request, cancel))
                .await
        } else {
            self.send(request, cancel).await
        }
    }

    async fn send_inner<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<Reply<T>> {
        let url = self.url_for(request)?;
        self.inner.limiter.wait(cancel).await?;
        let token = self.ensure_token(cancel).await?;

        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), url)
            .bearer_auth(token.access_token())
            .header(ACCEPT, ACCEPT_JSON);
        if request.experimental {
            builder = builder.header(EXPERIMENTAL_HEADER, "true");
        }
        if let Some((body, content_type)) = request.encoded_body()? {
            builder = builder.header(CONTENT_TYPE, content_type).body(body);
        }

        debug!("sending request");
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            response = builder.send() => response.map_err(Error::Transport)?,
        };

        let status = response.status().as_u16();
        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            body = response.bytes() => body.map_err(Error::Transport)?,
        };

        if let Some(err) = classify_status(status, &body) {
            if err.is_not_found() {
                debug!(status, "resource not found");
            } else {
                warn!(status, error = %err, "API request failed");
            }
            return Err(err);
        }

        if status == 204 && request.method == Method::DELETE && body.is_empty() {
            debug!(status, "resource deleted");
            return Ok(Reply::NoContent);
        }

        let decoded = serde_json::from_slice(&body).map_err(|e| {
            warn!(status, error = %e, "failed to decode response body");
            Error::Decode(e)
        })?;
        debug!(status, "request succeeded");
        Ok(Reply::Json(decoded))
    }

    /// Paths are appended to the base URL verbatim, so they must be absolute.
    fn url_for(&self, request: &ApiRequest) -> Result<reqwest::Url> {
        if !request.path.starts_with('/') {
            return Err(Error::InvalidRequest(format!(
                "path must start with '/': {}",
                request.path
            )));
        }
        let raw = format!("{}{}", self.inner.base_url, request.path);
        let mut url = reqwest::Url::parse(&raw)
            .map_err(|e| Error::InvalidRequest(format!("{raw}: {e}")))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use identitynow_auth::IssueFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Issues `at-1`, `at-2`, ... and counts exchanges.
    pub(crate) struct CountingIssuer {
        pub calls: AtomicUsize,
        pub expired: bool,
        pub fail: bool,
    }

    impl CountingIssuer {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                expired: false,
                fail: false,
            })
        }

        pub fn always_expired() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                expired: true,
                fail: false,
            })
        }

        pub fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                expired: false,
                fail: true,
            })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TokenIssuer for CountingIssuer {
        fn issue<'a>(&'a self, _credential: &'a Credential) -> IssueFuture<'a> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let expired = self.expired;
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    return Err(identitynow_auth::Error::Rejected {
                        status: 401,
                        message: "Bad credentials".into(),
                    });
                }
                let now = Instant::now();
                Ok(if expired {
                    Token::with_expiry(format!("at-{n}"), now, now)
                } else {
                    Token::new(format!("at-{n}"), Some(3600), now)
                })
            })
        }
    }

    pub(crate) fn test_client(server: &MockServer, issuer: Arc<CountingIssuer>) -> Client {
        let options = ClientOptions {
            base_url: server.uri(),
            requests_per_second: NonZeroU32::new(1000).unwrap(),
            retry: RetryPolicy::new(3, Duration::from_millis(10)),
        };
        Client::new(
            options,
            Credential::new("client-a", "s3cr3t"),
            reqwest::Client::new(),
            issuer,
        )
    }

    #[tokio::test]
    async fn get_attaches_bearer_and_decodes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/sources/abc"))
            .and(header("authorization", "Bearer at-1"))
            .and(header("accept", ACCEPT_JSON))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "abc", "name": "AD"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let issuer = CountingIssuer::new();
        let client = test_client(&server, issuer.clone());
        let cancel = CancellationToken::new();

        let reply: Reply<serde_json::Value> = client
            .send(&ApiRequest::get("/v3/sources/abc"), &cancel)
            .await
            .unwrap();
        assert_eq!(reply.into_body().unwrap()["name"], "AD");
        assert_eq!(issuer.calls(), 1);
        assert!(client.has_valid_token().await);
    }

    #[tokio::test]
    async fn valid_token_is_reused_across_sends() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer at-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(3)
            .mount(&server)
            .await;

        let issuer = CountingIssuer::new();
        let client = test_client(&server, issuer.clone());
        let cancel = CancellationToken::new();
        for _ in 0..3 {
            let _: Reply<Vec<serde_json::Value>> = client
                .send(&ApiRequest::get("/v3/roles"), &cancel)
                .await
                .unwrap();
        }
        assert_eq!(issuer.calls(), 1);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_at_send_time() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer at-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer at-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let issuer = CountingIssuer::always_expired();
        let client = test_client(&server, issuer.clone());
        let cancel = CancellationToken::new();
        let request = ApiRequest::get("/v3/identities");

        let _: Reply<serde_json::Value> = client.send(&request, &cancel).await.unwrap();
        let _: Reply<serde_json::Value> = client.send(&request, &cancel).await.unwrap();

        assert_eq!(issuer.calls(), 2);
        assert!(!client.has_valid_token().await);
    }

    #[tokio::test]
    async fn token_failure_is_surfaced_and_no_request_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = test_client(&server, CountingIssuer::failing());
        let cancel = CancellationToken::new();
        let err = client
            .send::<serde_json::Value>(&ApiRequest::get("/v3/sources"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Token(_)), "got: {err:?}");
        assert!(err.to_string().contains("Bad credentials"));
        assert_eq!(client.token_expiry().await, None);
    }

    #[tokio::test]
    async fn relative_path_is_rejected_before_any_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let issuer = CountingIssuer::new();
        let client = test_client(&server, issuer.clone());
        let cancel = CancellationToken::new();
        let err = client
            .execute::<serde_json::Value>(&ApiRequest::get("v3/sources"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)), "got: {err:?}");
        assert!(err.to_string().contains("v3/sources"));
        assert_eq!(issuer.calls(), 0);
    }

    #[tokio::test]
    async fn classified_statuses() {
        let server = MockServer::start().await;
        Mock::given(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "messages": [{"text": "no such object"}]
            })))
            .mount(&server)
            .await;
        Mock::given(path("/busy"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(path("/slow"))
            .respond_with(ResponseTemplate::new(504))
            .mount(&server)
            .await;
        Mock::given(path("/bad"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "detailCode": "400.1 Bad Request Content",
                "messages": [{"locale": "en-US", "localeOrigin": "DEFAULT", "text": "bad filter"}]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server, CountingIssuer::new());
        let cancel = CancellationToken::new();
        let send = |p: &'static str| {
            let client = client.clone();
            let cancel = cancel.clone();
            async move {
                client
                    .send::<serde_json::Value>(&ApiRequest::get(p), &cancel)
                    .await
                    .unwrap_err()
            }
        };

        assert!(send("/missing").await.is_not_found());
        assert_eq!(send("/busy").await.to_string(), "rate limit exceeded (429)");
        assert!(matches!(send("/slow").await, Error::GatewayTimeout));
        let bad = send("/bad").await;
        assert!(
            matches!(&bad, Error::Generic { status: 400, message } if message == "bad filter"),
            "got: {bad:?}"
        );
    }

    #[tokio::test]
    async fn delete_with_empty_204_is_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v3/roles/r1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = test_client(&server, CountingIssuer::new());
        let cancel = CancellationToken::new();
        let reply: Reply<serde_json::Value> = client
            .send(&ApiRequest::delete("/v3/roles/r1"), &cancel)
            .await
            .unwrap();
        assert_eq!(reply, Reply::NoContent);
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .mount(&server)
            .await;

        let client = test_client(&server, CountingIssuer::new());
        let cancel = CancellationToken::new();
        let err = client
            .send::<serde_json::Value>(&ApiRequest::get("/v3/sources"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn experimental_header_and_query_are_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2025/source-apps"))
            .and(header("x-sailpoint-experimental", "true"))
            .and(query_param("filters", r#"name eq "Slack""#))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server, CountingIssuer::new());
        let cancel = CancellationToken::new();
        let request = ApiRequest::get("/v2025/source-apps")
            .query("filters", r#"name eq "Slack""#)
            .experimental();
        let reply: Reply<Vec<serde_json::Value>> = client.send(&request, &cancel).await.unwrap();
        assert!(reply.into_body().unwrap().is_empty());
    }

    #[tokio::test]
    async fn idempotent_request_is_retried_on_429() {
        let server = MockServer::start().await;
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        Mock::given(method("GET"))
            .respond_with(move |_req: &wiremock::Request| -> ResponseTemplate {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    ResponseTemplate::new(429)
                } else {
                    ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true}))
                }
            })
            .expect(3)
            .mount(&server)
            .await;

        let client = test_client(&server, CountingIssuer::new());
        let cancel = CancellationToken::new();
        let reply: Reply<serde_json::Value> = client
            .execute(&ApiRequest::get("/v3/sources/abc"), &cancel)
            .await
            .unwrap();
        assert_eq!(reply.into_body().unwrap()["ok"], true);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn post_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server, CountingIssuer::new());
        let cancel = CancellationToken::new();
        let request = ApiRequest::post("/v3/access-profiles")
            .json(&serde_json::json!({"name": "Finance"}))
            .unwrap();
        let err = client
            .execute::<serde_json::Value>(&request, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RateLimited));
    }

    #[tokio::test]
    async fn cancelled_caller_stops_at_rate_limiter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let issuer = CountingIssuer::new();
        let client = test_client(&server, issuer.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client
            .send::<serde_json::Value>(&ApiRequest::get("/v3/sources"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RateLimiterCancelled), "got: {err:?}");
        assert_eq!(issuer.calls(), 0);
    }

    #[tokio::test]
    async fn transport_failure_is_surfaced() {
        let options = ClientOptions::new("http://127.0.0.1:1");
        let client = Client::new(
            options,
            Credential::new("client-a", "s3cr3t"),
            reqwest::Client::new(),
            CountingIssuer::new(),
        );
        let cancel = CancellationToken::new();
        let err = client
            .send::<serde_json::Value>(&ApiRequest::get("/v3/sources"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)), "got: {err:?}");
    }

    #[test]
    fn debug_hides_secret() {
        let client = Client::new(
            ClientOptions::new("https://acme.api.identitynow.com/"),
            Credential::new("client-a", "s3cr3t"),
            reqwest::Client::new(),
            CountingIssuer::new(),
        );
        let debug = format!("{client:?}");
        assert!(debug.contains("client-a"));
        assert!(!debug.contains("s3cr3t"));
        assert_eq!(client.base_url(), "https://acme.api.identitynow.com");
    }
}
