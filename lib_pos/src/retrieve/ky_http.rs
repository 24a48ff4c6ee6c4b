//! # HTTP Retrieval Utilities
//!
//! This module provides a robust, asynchronous API client wrapper around `reqwest`.
//! It includes middleware support for exponential backoff retries, a hard
//! deadline on every call, cache-defeating GETs and a single error type that
//! every remote collaborator of the terminal reports through.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use reqwest::{Method, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::utils::misc::utils::unix_millis;

/// Deadline applied to every call unless configured otherwise.
pub const DEFAULT_TIMEOUT_MS: u64 = 7000;

/// Transient retries performed inside the deadline unless configured otherwise.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

const USER_AGENT: &str = "YuricaPOS/1.0";

static CACHE_BUST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Failures of a remote call, normalized into one channel.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The base URL or a joined path could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Connection-level failure (DNS, refused, reset, TLS, body read).
    #[error("Network error requesting {url}: {message}")]
    Network { url: String, message: String },

    /// The deadline elapsed before the call resolved.
    #[error("Request to {url} timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64, url: String },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// The body could not be decoded into the expected shape.
    #[error("Malformed response from {url}: {message}")]
    MalformedResponse { url: String, message: String },

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    Setup(String),
}

impl FetchError {
    /// Short message suitable for showing to staff on the terminal.
    pub fn describe(&self) -> String {
        match self {
            FetchError::InvalidUrl(_) => "Server address is not configured correctly.".to_string(),
            FetchError::Network { .. } => {
                "Could not reach the server. Check the connection and try again.".to_string()
            }
            FetchError::Timeout { timeout_ms, .. } => {
                format!("The server did not answer within {:.1}s.", *timeout_ms as f64 / 1000.0)
            }
            FetchError::HttpStatus { status, .. } => format!("Server error (HTTP {}).", status),
            FetchError::MalformedResponse { .. } => "The server sent an unreadable response.".to_string(),
            FetchError::Setup(_) => "The terminal could not start its network client.".to_string(),
        }
    }
}

/// Construction options for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Deadline for a whole call, retries and body read included.
    pub timeout: Duration,
    /// Transient-failure retries. `0` disables the retry middleware.
    pub max_retries: u32,
    /// Optional Bearer token sent as `Authorization`.
    pub auth_token: Option<String>,
    /// Headers attached to every request (e.g. `apikey`).
    pub default_headers: HeaderMap,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            auth_token: None,
            default_headers: HeaderMap::new(),
        }
    }
}

/// A standardized container for API responses.
///
/// The body is kept as text so callers decide how strictly to decode it.
#[derive(Debug)]
pub struct ApiResponse {
    /// The raw response body.
    pub body: String,
    /// The numeric HTTP status code.
    pub status: u16,
    /// Indicates if the status code was in the 2xx range.
    pub success: bool,
    /// The headers returned by the server.
    pub headers: HeaderMap,
    /// The absolute URL that was requested.
    pub url: String,
}

impl ApiResponse {
    /// Turns a non-2xx response into [`FetchError::HttpStatus`].
    pub fn error_for_status(self) -> Result<Self, FetchError> {
        if self.success {
            Ok(self)
        } else {
            Err(FetchError::HttpStatus {
                status: self.status,
                url: self.url,
            })
        }
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        serde_json::from_str(&self.body).map_err(|e| FetchError::MalformedResponse {
            url: self.url.clone(),
            message: e.to_string(),
        })
    }
}

/// A flexible asynchronous HTTP client.
///
/// Built on top of `reqwest_middleware`, it handles base URLs, authentication
/// tokens, default headers, deadlines and automatic retries. One instance is
/// built per remote service and shared by reference.
pub struct ApiClient {
    /// The underlying middleware-enabled client.
    inner: ClientWithMiddleware,
    /// The base URL to which all relative paths are joined.
    base_url: Url,
    /// An optional Bearer token used for authorization.
    auth_token: Option<String>,
    /// Headers attached to every request.
    default_headers: HeaderMap,
    /// Deadline for a whole call.
    timeout: Duration,
}

impl ApiClient {
    /// Creates a new `ApiClient`.
    ///
    /// # Arguments
    /// * `base_url` - The absolute base URL for the API (e.g., "http://192.168.0.4:4000").
    /// * `options` - Deadline, retry and header settings.
    ///
    /// # Errors
    /// Returns [`FetchError::InvalidUrl`] if `base_url` is not an absolute URL
    /// and [`FetchError::Setup`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, options: ClientOptions) -> Result<Self, FetchError> {
        // Url::join drops the last segment unless the base ends with a slash
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let url = Url::parse(&normalized).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let http = build_http(USER_AGENT)?;

        let mut builder = ClientBuilder::new(http);
        if options.max_retries > 0 {
            let retry_policy = ExponentialBackoff::builder().build_with_max_retries(options.max_retries);
            builder = builder.with(RetryTransientMiddleware::new_with_policy(retry_policy));
        }

        Ok(Self {
            inner: builder.build(),
            base_url: url,
            auth_token: options.auth_token,
            default_headers: options.default_headers,
            timeout: options.timeout,
        })
    }

    /// The normalized base URL (always ends with `/`).
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The deadline applied to each call.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Joins `path` onto the base URL and appends `query` pairs.
    pub fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, FetchError> {
        let mut url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", path, e)))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Performs a generic HTTP request under the client's deadline.
    ///
    /// Non-2xx statuses are not errors here; they come back with
    /// `success == false` so callers can decide. Use
    /// [`ApiResponse::error_for_status`] to turn them into errors.
    ///
    /// # Errors
    /// `InvalidUrl`, `Network` or `Timeout`.
    pub async fn request<B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        headers: Option<HeaderMap>,
        body: Option<&B>,
    ) -> Result<ApiResponse, FetchError>
    where
        B: Serialize + ?Sized,
    {
        let full_url = self.endpoint(path, query)?;
        let url_text = full_url.to_string();

        match tokio::time::timeout(self.timeout, self.execute(method, full_url, headers, body)).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!("Request to {} abandoned after {}ms", url_text, self.timeout.as_millis());
                Err(FetchError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                    url: url_text,
                })
            }
        }
    }

    /// GET that can never be answered from an intermediate cache: adds a
    /// unique `t` query parameter and `no-store` directives.
    pub async fn get_fresh(&self, path: &str, query: &[(&str, &str)]) -> Result<ApiResponse, FetchError> {
        let token = cache_bust_token();
        let mut pairs: Vec<(&str, &str)> = query.to_vec();
        pairs.push(("t", token.as_str()));

        self.request::<()>(Method::GET, path, &pairs, Some(no_store_headers()), None).await
    }

    /// GET with `no-store` directives only, leaving the query untouched.
    ///
    /// For servers that treat every query parameter as meaningful, like
    /// PostgREST which reads an unknown `t` as a column filter.
    pub async fn get_no_store(&self, path: &str, query: &[(&str, &str)]) -> Result<ApiResponse, FetchError> {
        self.request::<()>(Method::GET, path, query, Some(no_store_headers()), None).await
    }

    /// POSTs `body` as JSON.
    pub async fn post_json<B>(&self, path: &str, body: &B) -> Result<ApiResponse, FetchError>
    where
        B: Serialize + ?Sized,
    {
        self.request(Method::POST, path, &[], None, Some(body)).await
    }

    async fn execute<B>(
        &self,
        method: Method,
        full_url: Url,
        headers: Option<HeaderMap>,
        body: Option<&B>,
    ) -> Result<ApiResponse, FetchError>
    where
        B: Serialize + ?Sized,
    {
        let url_text = full_url.to_string();
        let mut req = self.inner.request(method, full_url);

        if !self.default_headers.is_empty() {
            req = req.headers(self.default_headers.clone());
        }
        if let Some(h) = headers {
            req = req.headers(h);
        }
        if let Some(token) = &self.auth_token {
            req = req.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(b) = body {
            let json_body = serde_json::to_string(b).map_err(|e| FetchError::MalformedResponse {
                url: url_text.clone(),
                message: format!("request body: {}", e),
            })?;
            req = req.header(CONTENT_TYPE, "application/json").body(json_body);
        }

        let response = req.send().await.map_err(|e| FetchError::Network {
            url: url_text.clone(),
            message: e.to_string(),
        })?;
        let status = response.status();
        let resp_headers = response.headers().clone();

        let body = response.text().await.map_err(|e| FetchError::Network {
            url: url_text.clone(),
            message: e.to_string(),
        })?;

        Ok(ApiResponse {
            body,
            status: status.as_u16(),
            success: status.is_success(),
            headers: resp_headers,
            url: url_text,
        })
    }
}

fn build_http(user_agent: &str) -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .build()
        .map_err(|e| FetchError::Setup(e.to_string()))
}

fn no_store_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers
}

/// A token unique within the process: unix millis plus a running counter.
pub fn cache_bust_token() -> String {
    let n = CACHE_BUST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}", unix_millis(), n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_without_trailing_slash_keeps_its_path() {
        let client = ApiClient::new("http://10.0.0.4:4000/pos", ClientOptions::default()).unwrap();
        let url = client.endpoint("/api/menu", &[]).unwrap();
        assert_eq!(url.as_str(), "http://10.0.0.4:4000/pos/api/menu");
    }

    #[test]
    fn relative_base_is_rejected() {
        let err = ApiClient::new("not a url", ClientOptions::default()).err().unwrap();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }

    #[test]
    fn query_pairs_are_encoded() {
        let client = ApiClient::new("https://db.example.co", ClientOptions::default()).unwrap();
        let url = client
            .endpoint("rest/v1/menus", &[("select", "*"), ("is_available", "eq.true")])
            .unwrap();
        assert_eq!(url.query(), Some("select=*&is_available=eq.true"));
    }

    #[test]
    fn cache_bust_tokens_never_repeat() {
        let a = cache_bust_token();
        let b = cache_bust_token();
        assert_ne!(a, b);
    }

    #[test]
    fn timeout_message_mentions_the_bound() {
        let err = FetchError::Timeout {
            timeout_ms: 7000,
            url: "http://x/api/menu".into(),
        };
        assert_eq!(err.describe(), "The server did not answer within 7.0s.");
        assert!(err.to_string().contains("7000ms"));
    }

    #[test]
    fn client_build_failure_is_reported() {
        let err = build_http("YuricaPOS\n1.0").err().unwrap();
        assert!(matches!(err, FetchError::Setup(_)));
        assert!(build_http(USER_AGENT).is_ok());
    }
}
