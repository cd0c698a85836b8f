//! Admission and offline-short-circuit rule sets.
//!
//! A rule is a named predicate over a request plus ambient state; a
//! decision set passes only when every rule in it holds. The names exist
//! for the logs: when a request is not intercepted, the first failing
//! rule says why.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::request::InterceptRequest;
use overcast_core::AppConfig;

/// Ambient connectivity signal.
///
/// Set by the host (the peer client observes online/offline transitions)
/// and adjusted opportunistically by strategy fetch outcomes. Shared by
/// cloning.
#[derive(Clone, Debug)]
pub struct Connectivity(Arc<AtomicBool>);

impl Connectivity {
    /// Fresh signal that reports online until told otherwise.
    pub fn assume_online() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_online(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set_online(&self, online: bool) {
        let was = self.0.swap(online, Ordering::Relaxed);
        if was != online {
            tracing::info!(online, "connectivity changed");
        }
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::assume_online()
    }
}

/// Everything a rule may inspect.
pub struct RuleCx<'a> {
    pub request: &'a InterceptRequest,
    pub config: &'a AppConfig,
    pub online: bool,
}

pub type Rule = fn(&RuleCx<'_>) -> bool;

/// Every rule here must pass for a request to be handled at all.
pub const ADMISSION: &[(&str, Rule)] = &[
    ("safe-method", safe_method),
    ("referrer-in-scope", referrer_in_scope),
    ("known-host", known_host),
];

/// When all of these hold, routing is bypassed and the offline page served.
pub const OFFLINE_SHORT_CIRCUIT: &[(&str, Rule)] = &[("offline", offline), ("navigation", navigation)];

/// Evaluate a decision set, logging the first failing rule.
pub fn all_pass(rules: &[(&str, Rule)], cx: &RuleCx<'_>) -> bool {
    for (name, rule) in rules {
        if !rule(cx) {
            tracing::debug!(rule = name, url = %cx.request.url, "rule did not pass");
            return false;
        }
    }
    true
}

fn safe_method(cx: &RuleCx<'_>) -> bool {
    matches!(cx.request.method.to_ascii_uppercase().as_str(), "GET" | "HEAD")
}

fn referrer_in_scope(cx: &RuleCx<'_>) -> bool {
    match cx.request.referrer.as_deref() {
        None | Some("") => true,
        Some(referrer) => {
            let referrer_host = host_of(referrer);
            referrer_host.is_some() && referrer_host == cx.config.origin_host()
        }
    }
}

fn known_host(cx: &RuleCx<'_>) -> bool {
    match host_of(&cx.request.url) {
        None => false,
        Some(host) => {
            Some(&host) == cx.config.origin_host().as_ref() || cx.config.allowed_hosts.iter().any(|h| *h == host)
        }
    }
}

fn offline(cx: &RuleCx<'_>) -> bool {
    !cx.online
}

fn navigation(cx: &RuleCx<'_>) -> bool {
    cx.request.navigate
}

fn host_of(url: &str) -> Option<String> {
    url::Url::parse(url).ok()?.host_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig {
            origin: "https://example.com".into(),
            allowed_hosts: vec!["fonts.gstatic.com".into()],
            ..Default::default()
        }
    }

    fn admitted(request: &InterceptRequest, config: &AppConfig) -> bool {
        all_pass(ADMISSION, &RuleCx { request, config, online: true })
    }

    #[test]
    fn test_post_is_not_admitted() {
        let config = config();
        let request = InterceptRequest::get("https://example.com/api").with_method("POST");
        assert!(!admitted(&request, &config));
    }

    #[test]
    fn test_head_is_admitted() {
        let config = config();
        let request = InterceptRequest::get("https://example.com/a.css").with_method("HEAD");
        assert!(admitted(&request, &config));
    }

    #[test]
    fn test_origin_host_is_admitted() {
        let config = config();
        assert!(admitted(&InterceptRequest::get("https://example.com/a.css"), &config));
    }

    #[test]
    fn test_allowed_host_is_admitted() {
        let config = config();
        assert!(admitted(&InterceptRequest::get("https://fonts.gstatic.com/font.woff2"), &config));
    }

    #[test]
    fn test_unknown_host_is_not_admitted() {
        let config = config();
        assert!(!admitted(&InterceptRequest::get("https://tracker.example.net/pixel.gif"), &config));
    }

    #[test]
    fn test_empty_referrer_is_admitted() {
        let config = config();
        let request = InterceptRequest::get("https://example.com/a.css").with_referrer("");
        assert!(admitted(&request, &config));
    }

    #[test]
    fn test_same_origin_referrer_is_admitted() {
        let config = config();
        let request = InterceptRequest::get("https://example.com/a.css").with_referrer("https://example.com/page");
        assert!(admitted(&request, &config));
    }

    #[test]
    fn test_cross_origin_referrer_is_not_admitted() {
        let config = config();
        let request = InterceptRequest::get("https://example.com/a.css").with_referrer("https://evil.example.org/");
        assert!(!admitted(&request, &config));
    }

    #[test]
    fn test_offline_short_circuit_requires_both() {
        let config = config();
        let navigation = InterceptRequest::navigation("https://example.com/about");
        let asset = InterceptRequest::get("https://example.com/a.css");

        let offline_nav = RuleCx { request: &navigation, config: &config, online: false };
        let online_nav = RuleCx { request: &navigation, config: &config, online: true };
        let offline_asset = RuleCx { request: &asset, config: &config, online: false };

        assert!(all_pass(OFFLINE_SHORT_CIRCUIT, &offline_nav));
        assert!(!all_pass(OFFLINE_SHORT_CIRCUIT, &online_nav));
        assert!(!all_pass(OFFLINE_SHORT_CIRCUIT, &offline_asset));
    }

    #[test]
    fn test_connectivity_flag() {
        let connectivity = Connectivity::assume_online();
        assert!(connectivity.is_online());
        connectivity.set_online(false);
        assert!(!connectivity.is_online());
        let clone = connectivity.clone();
        clone.set_online(true);
        assert!(connectivity.is_online());
    }
}
