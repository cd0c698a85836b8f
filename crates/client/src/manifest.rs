//! Versioned asset manifest loading.
//!
//! The build pipeline emits a flat JSON object mapping logical asset names
//! to content-hashed paths (`{"main.css": "/assets/main-ab12.css"}`). Only
//! the values matter here; they become the precache list. The manifest is
//! always fetched with cache-bypass headers so a stale copy of it can
//! never pin a stale asset set.

use crate::fetch::Fetcher;
use overcast_core::Error;

/// Fetch and parse a manifest.
pub async fn load(fetcher: &dyn Fetcher, manifest_url: &str) -> Result<Vec<String>, Error> {
    let response = fetcher
        .fetch_no_cache(manifest_url)
        .await
        .map_err(|e| Error::ManifestFetch(e.to_string()))?;

    if !response.is_success() {
        return Err(Error::ManifestFetch(format!("status {} from {manifest_url}", response.status)));
    }

    parse(&response.body)
}

/// Parse manifest bytes into the ordered list of URLs to precache.
pub fn parse(bytes: &[u8]) -> Result<Vec<String>, Error> {
    let value: serde_json::Value = serde_json::from_slice(bytes).map_err(|e| Error::ManifestParse(e.to_string()))?;

    let object = value
        .as_object()
        .ok_or_else(|| Error::ManifestParse("expected a JSON object".into()))?;

    object
        .iter()
        .map(|(name, value)| {
            value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| Error::ManifestParse(format!("non-string value for {name:?}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flat_object() {
        let manifest = br#"{"main.css": "/assets/main-ab12.css", "main.js": "/assets/main-cd34.js"}"#;
        let urls = parse(manifest).unwrap();
        assert_eq!(urls.len(), 2);
        assert!(urls.contains(&"/assets/main-ab12.css".to_string()));
        assert!(urls.contains(&"/assets/main-cd34.js".to_string()));
    }

    #[test]
    fn test_parse_empty_object() {
        let urls = parse(b"{}").unwrap();
        assert!(urls.is_empty());
    }

    #[test]
    fn test_parse_rejects_non_object() {
        let result = parse(b"[\"/assets/main.css\"]");
        assert!(matches!(result, Err(Error::ManifestParse(_))));
    }

    #[test]
    fn test_parse_rejects_non_string_value() {
        let result = parse(br#"{"main.css": 42}"#);
        assert!(matches!(result, Err(Error::ManifestParse(_))));
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        let result = parse(b"not json");
        assert!(matches!(result, Err(Error::ManifestParse(_))));
    }
}
