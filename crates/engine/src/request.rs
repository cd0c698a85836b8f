//! The dispatcher's view of an outgoing request.

use overcast_core::RequestKey;

/// An outgoing request as presented by the host environment.
#[derive(Debug, Clone)]
pub struct InterceptRequest {
    pub method: String,
    pub url: String,
    /// Referrer as reported by the host; empty or absent both mean "none".
    pub referrer: Option<String>,
    /// True for a top-level navigation (an address-bar load rather than a
    /// subresource fetch).
    pub navigate: bool,
    /// Accept header, when the host passes one through.
    pub accept: Option<String>,
}

impl InterceptRequest {
    /// A plain GET subresource request.
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: "GET".to_string(), url: url.into(), referrer: None, navigate: false, accept: None }
    }

    /// A top-level navigation.
    pub fn navigation(url: impl Into<String>) -> Self {
        Self {
            accept: Some("text/html,application/xhtml+xml".to_string()),
            navigate: true,
            ..Self::get(url)
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    /// Normalized cache key for this request.
    pub fn key(&self) -> RequestKey {
        RequestKey::new(&self.method, &self.url)
    }
}
