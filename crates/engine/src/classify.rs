//! Request classification.
//!
//! A pure function from request surface (navigation flag, Accept header,
//! URL extension) to a resource type. The routing table and the fallback
//! table key off the result; nothing here touches the store or network.

use crate::request::InterceptRequest;
use overcast_core::{AppConfig, ResourceType};

/// Classify a request. Navigation wins over headers, headers win over the
/// extension table, and anything unmatched is `Other`.
pub fn classify(request: &InterceptRequest, config: &AppConfig) -> ResourceType {
    if request.navigate {
        return ResourceType::Page;
    }

    if let Some(accept) = request.accept.as_deref() {
        if accept.contains("text/html") {
            return ResourceType::Page;
        }
        if accept.contains("text/css") {
            return ResourceType::Stylesheet;
        }
        if accept.contains("javascript") {
            return ResourceType::Script;
        }
        if accept.contains("image/") {
            return ResourceType::Image;
        }
    }

    extension(&request.url)
        .and_then(|ext| config.resource_extensions.get(&ext).copied())
        .unwrap_or(ResourceType::Other)
}

/// Lowercased extension of the URL's path, if it has one.
fn extension(url: &str) -> Option<String> {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        // Tolerate bare paths; admission has already vetted the URL by the
        // time classification matters.
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    let file = path.rsplit('/').next()?;
    let (stem, ext) = file.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
