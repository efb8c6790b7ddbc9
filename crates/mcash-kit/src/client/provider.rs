//! HTTP transport for the node, solidity node and event server.
//!
//! Every request goes through the [`Provider`] trait so the client can run
//! against any transport. [`HttpProvider`] is the `reqwest` implementation.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::Value;

use crate::error::RpcError;

/// Boxed future returned by [`Provider::request`].
pub type ProviderFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, RpcError>> + Send + 'a>>;

/// HTTP verb of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// A request against one provider.
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderRequest {
    /// Path relative to the provider host, e.g. `wallet/getnowblock`.
    pub path: String,
    pub method: HttpMethod,
    /// JSON body for `POST`.
    pub body: Option<Value>,
    /// Query string pairs.
    pub query: Vec<(String, String)>,
}

impl ProviderRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: HttpMethod::Get,
            body: None,
            query: Vec::new(),
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            path: path.into(),
            method: HttpMethod::Post,
            body: Some(body),
            query: Vec::new(),
        }
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// A transport that answers JSON requests.
///
/// # Example Implementation
///
/// ```rust
/// use mcash_kit::{Provider, ProviderFuture, ProviderRequest};
/// use serde_json::json;
///
/// #[derive(Debug)]
/// struct Offline;
///
/// impl Provider for Offline {
///     fn host(&self) -> &str {
///         "offline"
///     }
///
///     fn request(&self, _request: ProviderRequest) -> ProviderFuture<'_> {
///         Box::pin(async { Ok(json!({})) })
///     }
/// }
/// ```
pub trait Provider: fmt::Debug + Send + Sync {
    /// Base URL (or any label) of this provider.
    fn host(&self) -> &str;

    /// Send one request and parse the JSON body.
    fn request(&self, request: ProviderRequest) -> ProviderFuture<'_>;

    /// Probe a status page. Any non-empty JSON answer counts as connected.
    fn is_connected<'a>(&'a self, status_page: &'a str) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async move {
            match self.request(ProviderRequest::get(status_page)).await {
                Ok(Value::Null) => false,
                Ok(Value::Object(map)) => !map.is_empty(),
                Ok(_) => true,
                Err(_) => false,
            }
        })
    }
}

/// Retry configuration for transport calls.
///
/// The default performs no retries.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of retries.
    pub max_retries: u32,
    /// Initial delay in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// `reqwest`-backed provider.
#[derive(Clone)]
pub struct HttpProvider {
    host: String,
    client: reqwest::Client,
    retry_config: RetryConfig,
}

impl HttpProvider {
    /// Create a provider for an `http`/`https` base URL.
    pub fn new(host: impl Into<String>) -> Result<Self, RpcError> {
        Self::with_config(host, DEFAULT_TIMEOUT, RetryConfig::default())
    }

    /// Create a provider with a custom timeout and retry policy.
    pub fn with_config(
        host: impl Into<String>,
        timeout: Duration,
        retry_config: RetryConfig,
    ) -> Result<Self, RpcError> {
        let host = host.into();
        if !crate::validator::is_valid_url(&host) {
            return Err(RpcError::InvalidUrl(host));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            client,
            retry_config,
        })
    }

    /// Full URL of a request, query string included.
    fn url(&self, request: &ProviderRequest) -> Result<reqwest::Url, RpcError> {
        let raw = format!("{}/{}", self.host, request.path.trim_start_matches('/'));
        let mut url = reqwest::Url::parse(&raw).map_err(|_| RpcError::InvalidUrl(raw))?;
        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn call(&self, request: &ProviderRequest) -> Result<Value, RpcError> {
        let total_attempts = self.retry_config.max_retries + 1;

        for attempt in 0..total_attempts {
            match self.try_call(request).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < total_attempts - 1 => {
                    let delay = std::cmp::min(
                        self.retry_config.initial_delay_ms * 2u64.pow(attempt),
                        self.retry_config.max_delay_ms,
                    );
                    tracing::debug!(path = %request.path, attempt, delay, "retrying request");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        Err(RpcError::Timeout(total_attempts))
    }

    async fn try_call(&self, request: &ProviderRequest) -> Result<Value, RpcError> {
        let url = self.url(request)?;
        tracing::debug!(method = ?request.method, %url, "provider request");

        let builder = match request.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self
                .client
                .post(url)
                .json(request.body.as_ref().unwrap_or(&Value::Null)),
        };
        let response = builder.send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let retryable = is_retryable_status(status.as_u16());
            return Err(RpcError::network(
                format!("HTTP {}: {}", status, body),
                Some(status.as_u16()),
                retryable,
            ));
        }

        parse_body(&body)
    }
}

impl Provider for HttpProvider {
    fn host(&self) -> &str {
        &self.host
    }

    fn request(&self, request: ProviderRequest) -> ProviderFuture<'_> {
        Box::pin(async move { self.call(&request).await })
    }
}

impl fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpProvider")
            .field("host", &self.host)
            .field("retry_config", &self.retry_config)
            .finish()
    }
}

/// Parse a response body. An empty body reads as `null`.
fn parse_body(body: &str) -> Result<Value, RpcError> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(RpcError::Json)
}

/// Check if an HTTP status code is retryable.
fn is_retryable_status(status: u16) -> bool {
    // 408 Request Timeout, 429 Too Many Requests, 5xx Server Errors
    status == 408 || status == 429 || (500..600).contains(&status)
}
