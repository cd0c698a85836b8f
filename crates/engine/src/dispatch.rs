//! Per-request interception.
//!
//! The dispatcher never returns an error: a request either passes
//! through untouched, or gets a concrete response (from a strategy, a
//! configured fallback, the offline page, or a generic failure). Nothing
//! on this path may crash the host's request handling.

use crate::classify;
use crate::request::InterceptRequest;
use crate::rules::{self, RuleCx};
use crate::strategy::{self, Resolved, Source, StrategyCx};
use crate::Engine;
use overcast_core::{Error, RequestKey, ResourceType};

/// What the host should do with an intercepted request.
#[derive(Debug, Clone)]
pub enum Disposition {
    /// Not ours; forward to default handling unmodified.
    PassThrough,
    /// Serve this response.
    Response(Resolved),
}

impl Disposition {
    pub fn is_intercepted(&self) -> bool {
        matches!(self, Disposition::Response(_))
    }
}

pub(crate) async fn intercept(engine: &Engine, request: &InterceptRequest) -> Disposition {
    if !engine.lifecycle.ready().await {
        tracing::debug!(url = %request.url, "not ready; passing through");
        return Disposition::PassThrough;
    }
    let Some(generation) = engine.lifecycle.current().await else {
        return Disposition::PassThrough;
    };

    let cx = RuleCx { request, config: &engine.config, online: engine.connectivity.is_online() };
    if !rules::all_pass(rules::ADMISSION, &cx) {
        return Disposition::PassThrough;
    }

    let strategy_cx = StrategyCx {
        store: engine.store.clone(),
        net: engine.net.clone(),
        generation,
        connectivity: engine.connectivity.clone(),
        ignore_query: engine.config.ignore_query_on_match,
    };

    if rules::all_pass(rules::OFFLINE_SHORT_CIRCUIT, &cx) {
        return Disposition::Response(offline_page(engine, &strategy_cx).await);
    }

    let resource = classify::classify(request, &engine.config);
    let kind = strategy::route(resource);
    tracing::debug!(url = %request.url, resource = %resource, "dispatching to strategy");

    let outcome = strategy::run(kind, &strategy_cx, request).await;
    finish(engine, &strategy_cx, request, resource, outcome).await
}

/// Serve the precached offline page, or a generic failure if it is
/// somehow missing from the current generation.
async fn offline_page(engine: &Engine, cx: &StrategyCx) -> Resolved {
    match cached_url(engine, cx, &engine.config.offline_page).await {
        Some(mut page) => {
            page.source = Source::OfflinePage;
            page
        }
        None => {
            tracing::error!(page = %engine.config.offline_page, "offline page missing from cache");
            Resolved::failure("offline")
        }
    }
}

/// Apply the fallback policy to a strategy outcome. Any non-success
/// status counts as unusable for a type with a configured fallback.
async fn finish(
    engine: &Engine, cx: &StrategyCx, request: &InterceptRequest, resource: ResourceType,
    outcome: Result<Resolved, Error>,
) -> Disposition {
    let fallback_url = engine.config.fallbacks.get(&resource);

    match outcome {
        Ok(resolved) if resolved.is_success() => Disposition::Response(resolved),
        Ok(resolved) => match fallback_url {
            Some(url) => match cached_url(engine, cx, url).await {
                Some(mut fallback) => {
                    fallback.source = Source::Fallback;
                    tracing::debug!(url = %request.url, status = resolved.status, "serving fallback");
                    Disposition::Response(fallback)
                }
                None => {
                    tracing::warn!(fallback = %url, "configured fallback not cached");
                    Disposition::Response(resolved)
                }
            },
            // Unusable but deliverable; the host decides what a 404 looks like.
            None => Disposition::Response(resolved),
        },
        Err(err) => {
            if let Some(url) = fallback_url
                && let Some(mut fallback) = cached_url(engine, cx, url).await
            {
                fallback.source = Source::Fallback;
                tracing::debug!(url = %request.url, error = %err, "strategy failed; serving fallback");
                return Disposition::Response(fallback);
            }
            let no_fallback = Error::NoFallback(format!("{}: {err}", request.url));
            tracing::warn!(error = %no_fallback, "serving generic failure");
            Disposition::Response(Resolved::failure("service unavailable"))
        }
    }
}

/// Exact-match lookup of an origin-relative URL in the current generation.
async fn cached_url(engine: &Engine, cx: &StrategyCx, path: &str) -> Option<Resolved> {
    let url = engine.config.resolve_url(path).ok()?;
    let key = RequestKey::get(&url);
    cx.store
        .match_entry(&cx.generation, &key, false)
        .await
        .ok()
        .flatten()
        .map(|entry| Resolved::from_cached(entry, Source::Cache))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::StubFetcher;
    use overcast_core::{AppConfig, CacheStore};
    use std::sync::Arc;

    const MANIFEST: &str = r#"{"main.css": "/assets/main-ab12.css", "hero.png": "/assets/hero-ef56.png"}"#;

    fn full_stub() -> StubFetcher {
        StubFetcher::new()
            .respond("https://example.com/rev-manifest.json", 200, MANIFEST)
            .respond("https://example.com/assets/main-ab12.css", 200, "body{}")
            .respond_with("https://example.com/assets/hero-ef56.png", 200, Some("image/png"), b"\x89PNG hero")
            .respond("https://example.com/offline.html", 200, "<h1>offline</h1>")
            .respond_with("https://example.com/assets/blank.png", 200, Some("image/png"), b"\x89PNG blank")
    }

    fn test_config() -> Arc<AppConfig> {
        Arc::new(AppConfig { origin: "https://example.com".into(), ..Default::default() })
    }

    async fn installed_engine(stub: Arc<StubFetcher>) -> Engine {
        let store = CacheStore::open_in_memory().await.unwrap();
        let engine = Engine::new(test_config(), store, stub);
        engine.on_install().await.unwrap();
        engine.on_activate().await.unwrap();
        engine
    }

    #[tokio::test]
    async fn test_not_installed_passes_through() {
        let store = CacheStore::open_in_memory().await.unwrap();
        let engine = Engine::new(test_config(), store, Arc::new(StubFetcher::new()));

        let disposition = engine.intercept(&InterceptRequest::get("https://example.com/a.css")).await;

        assert!(!disposition.is_intercepted());
    }

    #[tokio::test]
    async fn test_post_passes_through() {
        let engine = installed_engine(Arc::new(full_stub())).await;
        let request = InterceptRequest::get("https://example.com/api").with_method("POST");

        assert!(!engine.intercept(&request).await.is_intercepted());
    }

    #[tokio::test]
    async fn test_disallowed_host_passes_through() {
        let engine = installed_engine(Arc::new(full_stub())).await;
        let request = InterceptRequest::get("https://tracker.example.net/pixel.gif");

        assert!(!engine.intercept(&request).await.is_intercepted());
    }

    #[tokio::test]
    async fn test_precached_stylesheet_served_without_network() {
        let stub = Arc::new(full_stub());
        let engine = installed_engine(stub.clone()).await;
        let calls_after_install = stub.call_count();

        let request = InterceptRequest::get("https://example.com/assets/main-ab12.css");
        let Disposition::Response(resolved) = engine.intercept(&request).await else {
            panic!("expected a response");
        };

        assert_eq!(resolved.source, Source::Cache);
        assert_eq!(resolved.body, bytes::Bytes::from_static(b"body{}"));
        assert_eq!(stub.call_count(), calls_after_install);
    }

    #[tokio::test]
    async fn test_offline_navigation_short_circuits_to_offline_page() {
        let engine = installed_engine(Arc::new(full_stub())).await;
        engine.connectivity().set_online(false);

        let request = InterceptRequest::navigation("https://example.com/pricing");
        let Disposition::Response(resolved) = engine.intercept(&request).await else {
            panic!("expected a response");
        };

        assert_eq!(resolved.source, Source::OfflinePage);
        assert_eq!(resolved.body, bytes::Bytes::from_static(b"<h1>offline</h1>"));
    }

    #[tokio::test]
    async fn test_missing_image_serves_fallback() {
        let stub = Arc::new(full_stub().respond_with(
            "https://example.com/assets/gone.png",
            404,
            Some("text/html"),
            b"not found",
        ));
        let engine = installed_engine(stub).await;

        let request = InterceptRequest::get("https://example.com/assets/gone.png");
        let Disposition::Response(resolved) = engine.intercept(&request).await else {
            panic!("expected a response");
        };

        assert_eq!(resolved.source, Source::Fallback);
        assert_eq!(resolved.body, bytes::Bytes::from_static(b"\x89PNG blank"));
    }

    #[tokio::test]
    async fn test_unreachable_page_serves_page_fallback() {
        let stub = Arc::new(full_stub().fail("https://example.com/pricing", "connection refused"));
        let engine = installed_engine(stub).await;

        let request = InterceptRequest::navigation("https://example.com/pricing");
        let Disposition::Response(resolved) = engine.intercept(&request).await else {
            panic!("expected a response");
        };

        assert_eq!(resolved.source, Source::Fallback);
        assert_eq!(resolved.body, bytes::Bytes::from_static(b"<h1>offline</h1>"));
    }

    #[tokio::test]
    async fn test_unusable_result_without_fallback_returns_as_is() {
        let stub = Arc::new(full_stub().respond("https://example.com/api/items.json", 500, "boom"));
        let engine = installed_engine(stub).await;

        let request = InterceptRequest::get("https://example.com/api/items.json");
        let Disposition::Response(resolved) = engine.intercept(&request).await else {
            panic!("expected a response");
        };

        assert_eq!(resolved.status, 500);
        assert_eq!(resolved.source, Source::Network);
    }

    #[tokio::test]
    async fn test_strategy_failure_without_fallback_is_generic_503() {
        let stub = Arc::new(full_stub().fail("https://example.com/api/items.json", "connection refused"));
        let engine = installed_engine(stub).await;

        let request = InterceptRequest::get("https://example.com/api/items.json");
        let Disposition::Response(resolved) = engine.intercept(&request).await else {
            panic!("expected a response");
        };

        assert_eq!(resolved.status, 503);
    }
}
