//! HTTP fetch pipeline behind the cache.
//!
//! ### URL Resolution
//! - Origin-form request targets resolve against the dashboard origin
//! - Absolute-form targets (third-party CDNs) are used as-is
//! - Lowercase host, remove fragments, preserve query string
//!
//! ### Safety Gates
//! - Cross-origin targets must resolve to public addresses (configurable)
//! - Max body bytes: 10MB (configurable)
//!
//! ### Proxy Semantics
//! - Any HTTP status is a successful fetch; only transport failures are errors
//! - Hop-by-hop headers are stripped in both directions
//! - Redirects are never followed; a 3xx reaches the page with its
//!   `Location` and `Set-Cookie` headers

pub mod ssrf;
pub mod url;

use async_trait::async_trait;
use dashcache_core::{Error, Request, Response};
use reqwest::{Client, header};
use std::time::{Duration, Instant};

pub use ssrf::{SsrfError, check_host, validate_ip};
pub use url::{UrlError, resolve_request_url};

/// Headers that describe a single connection and must not be forwarded or
/// stored.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut header::HeaderMap) {
    let named: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    for name in HOP_BY_HOP.iter().copied().chain(named.iter().map(String::as_str)) {
        headers.remove(name);
    }
}

/// Capability to fetch a request from the network.
///
/// Strategies and the worker only see this trait, so tests can substitute a
/// scripted network.
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform the request.
    ///
    /// Any HTTP status is `Ok`; `Err` means the network could not deliver a
    /// response at all.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "dashcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 10MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Dashboard origin; requests to it skip the private-address check.
    pub origin: Option<::url::Url>,

    /// Refuse cross-origin targets resolving to private addresses (default: true)
    pub block_private_cross_origin: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "dashcache/0.1".to_string(),
            max_bytes: 10 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            origin: None,
            block_private_cross_origin: true,
        }
    }
}

impl FetchConfig {
    /// Build from the application configuration.
    pub fn from_app(config: &dashcache_core::AppConfig, origin: ::url::Url) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            origin: Some(origin),
            block_private_cross_origin: config.block_private_cross_origin,
        }
    }
}

/// reqwest-backed network.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn is_origin(&self, url: &::url::Url) -> bool {
        self.config
            .origin
            .as_ref()
            .is_some_and(|origin| origin.origin() == url.origin())
    }

    fn outgoing_headers(&self, request: &Request) -> header::HeaderMap {
        let mut headers = request.headers.clone();
        strip_hop_by_hop(&mut headers);
        // reqwest negotiates and decodes compression itself.
        headers.remove(header::HOST);
        headers.remove(header::ACCEPT_ENCODING);
        headers.remove(header::CONTENT_LENGTH);
        headers
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let url = &request.url;

        if self.config.block_private_cross_origin && !self.is_origin(url) {
            check_host(url).await.map_err(|e| Error::BlockedAddress(e.to_string()))?;
        }

        let mut builder = self
            .http
            .request(request.method.clone(), url.as_str())
            .headers(self.outgoing_headers(request));
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::FetchTimeout(format!("{}: {}", url, e))
            } else {
                Error::Network(format!("{}: {}", url, e))
            }
        })?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let mut headers = response.headers().clone();

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                Error::FetchTimeout(format!("{}: {}", url, e))
            } else {
                Error::Network(format!("failed to read response: {}", e))
            }
        })?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        strip_hop_by_hop(&mut headers);
        headers.remove(header::CONTENT_LENGTH);

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            "fetched {} {} -> {} in {}ms ({} bytes)",
            request.method,
            url,
            status.as_u16(),
            fetch_ms,
            bytes.len()
        );

        Ok(Response::new(status, headers, bytes))
    }
}
