//! HTTP fetch layer.
//!
//! `Fetcher` is the seam between the decision engine and the network:
//! strategies and the lifecycle controller consume it, `NetClient`
//! implements it over reqwest, and tests substitute scripted fakes.
//!
//! Unlike a general-purpose client, a fetch here never fails on a non-2xx
//! status: the status travels back to the caller, because "usable" is a
//! strategy decision (fall back to cache? serve the configured fallback?
//! pass the failure through?), not a transport one.

pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, header};
use std::time::{Duration, Instant};

use overcast_core::{AppConfig, CachedResponse, Error};

pub use self::url::canonicalize;

/// Configuration for the network client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "overcast/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "overcast/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20_000),
            max_redirects: 5,
        }
    }
}

impl FetchConfig {
    /// Derive fetch settings from the application configuration.
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// Result of a network fetch, success or not.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The canonicalized URL that was requested.
    pub url: String,
    /// The final URL after redirects.
    pub final_url: String,
    /// HTTP status code.
    pub status: u16,
    /// Content-Type header.
    pub content_type: Option<String>,
    /// Response headers as a JSON object (string values only).
    pub headers_json: Option<String>,
    /// Response body bytes.
    pub body: Bytes,
    /// Time taken to fetch in milliseconds.
    pub fetch_ms: u64,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The stored form of this response, stamped with the fetch time.
    pub fn to_cached(&self) -> CachedResponse {
        CachedResponse {
            url: self.url.clone(),
            status: self.status,
            content_type: self.content_type.clone(),
            headers_json: self.headers_json.clone(),
            body: self.body.to_vec(),
            fetched_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Network access as the engine sees it.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET `url`.
    async fn fetch(&self, url: &str) -> Result<FetchResponse, Error>;

    /// GET `url` with cache-bypass headers, for content that must never be
    /// served stale (the asset manifest).
    async fn fetch_no_cache(&self, url: &str) -> Result<FetchResponse, Error>;
}

/// Reqwest-backed fetcher.
pub struct NetClient {
    http: Client,
    config: FetchConfig,
}

impl NetClient {
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::NetworkFetch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn get(&self, url_str: &str, bypass_caches: bool) -> Result<FetchResponse, Error> {
        let start = Instant::now();
        let url = canonicalize(url_str).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let mut request = self.http.get(url.as_str()).header(
            header::ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        );
        if bypass_caches {
            request = request
                .header(header::CACHE_CONTROL, "no-cache")
                .header(header::PRAGMA, "no-cache");
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::NetworkFetch(format!("{url}: {e}")))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::NetworkFetch(format!(
                "{url}: {len} bytes exceeds limit of {}",
                self.config.max_bytes
            )));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let headers_json = headers_to_json(response.headers());

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::NetworkFetch(format!("{url}: failed to read body: {e}")))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::NetworkFetch(format!(
                "{url}: {} bytes exceeds limit of {}",
                body.len(),
                self.config.max_bytes
            )));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(%url, status, fetch_ms, bytes = body.len(), "fetched");

        Ok(FetchResponse {
            url: url.to_string(),
            final_url,
            status,
            content_type,
            headers_json,
            body,
            fetch_ms,
        })
    }
}

#[async_trait]
impl Fetcher for NetClient {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, Error> {
        self.get(url, false).await
    }

    async fn fetch_no_cache(&self, url: &str) -> Result<FetchResponse, Error> {
        self.get(url, true).await
    }
}

fn headers_to_json(headers: &header::HeaderMap) -> Option<String> {
    let map: serde_json::Map<String, serde_json::Value> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), serde_json::Value::String(v.to_string())))
        })
        .collect();
    serde_json::to_string(&map).ok()
}
