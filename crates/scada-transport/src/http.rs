//! Request/response client with bounded retry.
//!
//! Retry contract for every request:
//! - 401: invalidate the session and fail with `Auth` (never retried)
//! - 429: wait `rate_limit_delay_ms` and re-issue the same attempt; does not
//!   consume a retry slot
//! - anything else: wait `retry_base_delay_ms * (attempt + 1)` and retry, up
//!   to `max_retries` times, then return the last error

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use scada_core::Snapshot;
use scada_telemetry::Metrics;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::error::{TransportError, TransportResult};
use crate::session::CredentialProvider;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Server endpoints used by the monitor and adjacent features.
pub mod endpoints {
    pub const DASHBOARD_STATUS: &str = "/api/dashboard/status";
    pub const AUTH_LOGIN: &str = "/api/auth/login";
    pub const AUTH_LOGOUT: &str = "/api/auth/logout";
    pub const DEFENSE_BLOCK_IP: &str = "/api/defense/block-ip";
    pub const FLAGS_SUBMIT: &str = "/api/flags/submit";
    pub const INCIDENTS_REPORT: &str = "/api/incidents/report";
    pub const PUSH_CHANNEL: &str = "/ws";
}

// ============================================================================
// Wire abstraction
// ============================================================================

/// One outgoing HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Sends a single HTTP request. Retry policy lives in `ApiClient`.
pub trait HttpBackend: Send + Sync {
    /// Transport-level failures map to `TransportError::Network`.
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, TransportResult<HttpResponse>>;
}

/// Production backend over reqwest.
pub struct ReqwestBackend {
    client: reqwest::Client,
}

impl ReqwestBackend {
    pub fn new(timeout: Duration) -> TransportResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl HttpBackend for ReqwestBackend {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, TransportResult<HttpResponse>> {
        Box::pin(async move {
            let mut builder = self.client.request(request.method, &request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = &request.body {
                builder = builder.body(body.to_string());
            }

            let response = builder
                .send()
                .await
                .map_err(|e| TransportError::Network(format!("HTTP request failed: {e}")))?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| TransportError::Network(format!("Failed to read body: {e}")))?;

            Ok(HttpResponse { status, body })
        })
    }
}

// ============================================================================
// Retry policy
// ============================================================================

/// Retry/backoff policy for requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt (attempts = max_retries + 1).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay unit; attempt `i` fails → wait `base * (i + 1)`.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Fixed wait after a 429 before re-issuing the same attempt.
    #[serde(default = "default_rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_rate_limit_delay_ms() -> u64 {
    5000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            rate_limit_delay_ms: default_rate_limit_delay_ms(),
        }
    }
}

impl RetryPolicy {
    /// Delay after the failed attempt with index `attempt` (0-based).
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(
            self.retry_base_delay_ms
                .saturating_mul(u64::from(attempt) + 1),
        )
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }
}

/// Retry bookkeeping for one logical request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingRetry {
    /// Retry slots consumed so far.
    pub attempt: u32,
    /// 429 waits so far (these do not consume slots).
    pub rate_limit_waits: u32,
    /// Total time spent waiting.
    pub elapsed_delay: Duration,
}

// ============================================================================
// Client
// ============================================================================

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL, e.g. `http://10.0.0.5`. Paths are appended verbatim.
    pub base_url: String,
    pub timeout_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1".to_string(),
            timeout_ms: 10_000,
            retry: RetryPolicy::default(),
        }
    }
}

struct ClientInner {
    config: ClientConfig,
    base_url: Url,
    backend: Arc<dyn HttpBackend>,
    credentials: Arc<dyn CredentialProvider>,
}

/// Injectable request client. Cheap to clone.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    /// Create a client over reqwest.
    pub fn new(
        config: ClientConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> TransportResult<Self> {
        let backend = ReqwestBackend::new(Duration::from_millis(config.timeout_ms))?;
        Self::with_backend(config, Arc::new(backend), credentials)
    }

    /// Create a client over an arbitrary backend.
    pub fn with_backend(
        config: ClientConfig,
        backend: Arc<dyn HttpBackend>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> TransportResult<Self> {
        let base_url = Url::parse(&config.base_url)?;
        match base_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(TransportError::InvalidUrl(format!(
                    "unsupported scheme '{other}' in {}",
                    config.base_url
                )))
            }
        }

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                base_url,
                backend,
                credentials,
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialProvider> {
        &self.inner.credentials
    }

    /// Absolute URL for an API path.
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}{}",
            self.inner.config.base_url.trim_end_matches('/'),
            path
        )
    }

    /// Push channel URL: `ws://host/ws` for http, `wss://host/ws` for https.
    pub fn push_url(&self) -> TransportResult<String> {
        let mut url = self.inner.base_url.clone();
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| TransportError::InvalidUrl(format!("cannot use {scheme} for {url}")))?;
        url.set_path(endpoints::PUSH_CHANNEL);
        url.set_query(None);
        url.set_fragment(None);
        Ok(url.to_string())
    }

    /// Issue a request with the configured retry ceiling.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> TransportResult<Value> {
        let max_retries = self.inner.config.retry.max_retries;
        self.request_with_retries(method, path, body, max_retries)
            .await
    }

    /// Issue a request with an explicit retry ceiling.
    pub async fn request_with_retries(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        max_retries: u32,
    ) -> TransportResult<Value> {
        let url = self.url_for(path);
        let policy = &self.inner.config.retry;
        let mut retry = PendingRetry::default();

        loop {
            let request = self.build_request(&method, &url, body.as_ref());
            debug!(%method, %url, attempt = retry.attempt, "Sending request");

            let outcome = match self.inner.backend.send(request).await {
                Ok(response) => classify_response(response),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(TransportError::Auth(message)) => {
                    warn!(%url, %message, "Unauthorized, invalidating session");
                    self.inner.credentials.invalidate();
                    Metrics::request_failed("auth");
                    return Err(TransportError::Auth(message));
                }
                Err(TransportError::RateLimited) => {
                    let delay = policy.rate_limit_delay();
                    retry.rate_limit_waits += 1;
                    retry.elapsed_delay += delay;
                    warn!(
                        %url,
                        delay_ms = delay.as_millis() as u64,
                        waits = retry.rate_limit_waits,
                        "Rate limited. Waiting..."
                    );
                    Metrics::request_retry("rate_limited");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if retry.attempt >= max_retries {
                        warn!(
                            %url,
                            error = %e,
                            attempts = retry.attempt + 1,
                            "Request failed after retries"
                        );
                        Metrics::request_failed(e.kind());
                        return Err(e);
                    }

                    let delay = policy.retry_delay(retry.attempt);
                    warn!(
                        %url,
                        error = %e,
                        attempt = retry.attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Request failed, retrying"
                    );
                    Metrics::request_retry(e.kind());
                    retry.attempt += 1;
                    retry.elapsed_delay += delay;
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    pub async fn get(&self, path: &str) -> TransportResult<Value> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TransportResult<Value> {
        self.request(Method::POST, path, Some(body)).await
    }

    /// Fetch and decode the full dashboard status.
    pub async fn fetch_status(&self) -> TransportResult<Snapshot> {
        let value = self.get(endpoints::DASHBOARD_STATUS).await?;
        Snapshot::from_value(value).map_err(|e| TransportError::Decode(e.to_string()))
    }

    fn build_request(&self, method: &Method, url: &str, body: Option<&Value>) -> HttpRequest {
        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        if let Some(token) = self.inner.credentials.token() {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        if let Some(session) = self.inner.credentials.session_id() {
            headers.push(("X-Session".to_string(), session));
        }

        HttpRequest {
            method: method.clone(),
            url: url.to_string(),
            headers,
            body: body.cloned(),
        }
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.config.base_url)
            .field("retry", &self.inner.config.retry)
            .finish()
    }
}

/// Map a raw response onto the error taxonomy.
fn classify_response(response: HttpResponse) -> TransportResult<Value> {
    let HttpResponse { status, body } = response;

    if (200..300).contains(&status) {
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        return serde_json::from_str(&body)
            .map_err(|e| TransportError::Decode(format!("Failed to parse response: {e}")));
    }

    let message = error_message(&body);
    match status {
        401 => Err(TransportError::Auth(message)),
        429 => Err(TransportError::RateLimited),
        _ => Err(TransportError::Server { status, message }),
    }
}

/// Best-effort error text from a JSON error body.
fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
        })
        .map(str::to_string)
        .unwrap_or_else(|| "Request failed".to_string())
}
