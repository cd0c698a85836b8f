//! Request fingerprinting for cache keys.

use sha2::{Digest, Sha256};

/// Normalized lookup key for one cached request.
///
/// Normalization takes the uppercased method and the URL with its fragment
/// stripped. Two fingerprints are derived: one over the full URL, one with
/// the query string also removed, so lookups can ignore cache-busting
/// query parameters when configured to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
    pub fingerprint: String,
    pub fingerprint_bare: String,
}

impl RequestKey {
    pub fn new(method: &str, url: &str) -> Self {
        let method = method.to_ascii_uppercase();
        let url = strip_fragment(url).to_string();
        let bare = strip_query(&url);
        let fingerprint = digest(&method, &url);
        let fingerprint_bare = digest(&method, bare);
        Self { method, url, fingerprint, fingerprint_bare }
    }

    /// Key for a plain GET of `url`, the common case.
    pub fn get(url: &str) -> Self {
        Self::new("GET", url)
    }
}

fn digest(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

fn strip_fragment(url: &str) -> &str {
    url.find('#').map_or(url, |i| &url[..i])
}

fn strip_query(url: &str) -> &str {
    url.find('?').map_or(url, |i| &url[..i])
}
