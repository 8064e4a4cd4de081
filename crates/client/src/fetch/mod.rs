//! Network access for the cache layer.
//!
//! ### Fetcher
//! - [`Fetcher`] is the seam between strategies and the network. Production
//!   uses [`HttpFetcher`] (reqwest); tests plug in a scripted double.
//! - Any HTTP status is a successful fetch. Only transport failures are errors.
//!
//! ### Timeouts
//! - [`fetch_with_timeout`] aborts a fetch after the configured timeout and
//!   discards any partial response. Callers treat the timeout exactly like a
//!   network error.
//!
//! ### URL resolution
//! - Pre-declared paths are resolved against the site origin; hosts are
//!   lowercased and fragments dropped so request identities are stable.

pub mod url;

#[cfg(any(test, feature = "testing"))]
pub mod scripted;

use async_trait::async_trait;
use postcache_core::{AppConfig, Request, Response};
use reqwest::{Client, Method, header};
use std::time::{Duration, Instant};

pub use url::{UrlError, resolve};

/// Transport-level fetch failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("response too large: {size} bytes exceeds {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("failed to build HTTP client: {0}")]
    Build(String),
}

impl From<FetchError> for postcache_core::Error {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Timeout(_) => postcache_core::Error::FetchTimeout(err.to_string()),
            _ => postcache_core::Error::Network(err.to_string()),
        }
    }
}

/// Something that can turn a request into a response over the network.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

/// Run `fetcher` with an abort-after-timeout.
pub async fn fetch_with_timeout(
    fetcher: &dyn Fetcher, request: &Request, timeout: Duration,
) -> Result<Response, FetchError> {
    match tokio::time::timeout(timeout, fetcher.fetch(request)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::debug!(url = %request.url, ?timeout, "fetch aborted");
            Err(FetchError::Timeout(timeout))
        }
    }
}

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "postcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 10s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "postcache/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(10_000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// reqwest-backed fetcher.
pub struct HttpFetcher {
    http: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| FetchError::Build(e.to_string()))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let start = Instant::now();
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| FetchError::Network(format!("invalid method {}: {e}", request.method)))?;

        let response = self
            .http
            .request(method, request.url.as_str())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(self.config.timeout)
                } else {
                    FetchError::Network(e.to_string())
                }
            })?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(FetchError::TooLarge { size: len as usize, limit: self.config.max_bytes });
        }

        let status = response.status();
        let mut snapshot = Response::new(status.as_u16(), Vec::new());
        if let Some(reason) = status.canonical_reason() {
            snapshot.status_text = reason.to_string();
        }
        for name in response.headers().keys() {
            let values: Vec<&str> = response
                .headers()
                .get_all(name)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .collect();
            if !values.is_empty() {
                snapshot.headers.insert(name.as_str().to_string(), values.join(", "));
            }
        }
        // reqwest decompresses bodies, so the upstream framing headers no longer apply
        snapshot.headers.remove(header::CONTENT_ENCODING.as_str());
        snapshot.headers.remove(header::CONTENT_LENGTH.as_str());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(format!("failed to read response: {e}")))?;

        if bytes.len() > self.config.max_bytes {
            return Err(FetchError::TooLarge { size: bytes.len(), limit: self.config.max_bytes });
        }
        snapshot.body = bytes.to_vec();

        tracing::debug!(
            url = %request.url,
            status = snapshot.status,
            bytes = snapshot.body.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "fetched"
        );

        Ok(snapshot)
    }
}
