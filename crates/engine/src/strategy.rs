//! Fetch-and-cache strategies and the type → strategy routing table.
//!
//! Each strategy resolves one request from some combination of cache and
//! network. `pass_through_and_cache` is the base building block: always
//! network, write-through on success, no cache fallback. The others
//! compose it with a cache lookup in different orders.
//!
//! Write-through failures never fail the request that triggered them;
//! they are logged and the response is served anyway.

use std::sync::Arc;

use bytes::Bytes;
use tokio::task::JoinHandle;

use crate::request::InterceptRequest;
use crate::rules::Connectivity;
use overcast_client::{FetchResponse, Fetcher};
use overcast_core::{CacheStore, CachedResponse, Error, Generation, ResourceType};

/// Which strategy resolves a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    OfflineFirst,
    OnlineFirst,
    Race,
    PassThroughAndCache,
}

/// Static routing table. Types without a row resolve online-first.
const ROUTES: &[(ResourceType, StrategyKind)] = &[
    (ResourceType::Page, StrategyKind::OnlineFirst),
    (ResourceType::Stylesheet, StrategyKind::OfflineFirst),
    (ResourceType::Script, StrategyKind::OfflineFirst),
    (ResourceType::Image, StrategyKind::OfflineFirst),
];

pub fn route(resource: ResourceType) -> StrategyKind {
    ROUTES
        .iter()
        .find(|(candidate, _)| *candidate == resource)
        .map(|(_, kind)| *kind)
        .unwrap_or(StrategyKind::OnlineFirst)
}

/// Everything a strategy needs. Clones share the underlying handles,
/// which keeps the race strategy's detached network leg cheap.
#[derive(Clone)]
pub struct StrategyCx {
    pub store: CacheStore,
    pub net: Arc<dyn Fetcher>,
    pub generation: Generation,
    pub connectivity: Connectivity,
    pub ignore_query: bool,
}

/// Where a resolved response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Network,
    Fallback,
    OfflinePage,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Cache => write!(f, "cache"),
            Source::Network => write!(f, "network"),
            Source::Fallback => write!(f, "fallback"),
            Source::OfflinePage => write!(f, "offline-page"),
        }
    }
}

/// A strategy's answer, normalized from either side of the cache/network
/// divide.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
    pub source: Source,
}

impl Resolved {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn from_cached(entry: CachedResponse, source: Source) -> Self {
        Self {
            status: entry.status,
            content_type: entry.content_type,
            body: Bytes::from(entry.body),
            source,
        }
    }

    pub fn from_network(response: &FetchResponse) -> Self {
        Self {
            status: response.status,
            content_type: response.content_type.clone(),
            body: response.body.clone(),
            source: Source::Network,
        }
    }

    /// Generic failure response, served when neither network, cache, nor
    /// any fallback can answer.
    pub fn failure(detail: &str) -> Self {
        Self {
            status: 503,
            content_type: Some("text/plain".to_string()),
            body: Bytes::from(detail.as_bytes().to_vec()),
            source: Source::Network,
        }
    }
}

/// Dispatch a strategy by kind.
pub async fn run(kind: StrategyKind, cx: &StrategyCx, request: &InterceptRequest) -> Result<Resolved, Error> {
    match kind {
        StrategyKind::OfflineFirst => offline_first(cx, request).await,
        StrategyKind::OnlineFirst => online_first(cx, request).await,
        StrategyKind::Race => race(cx, request).await,
        StrategyKind::PassThroughAndCache => pass_through_and_cache(cx, request).await,
    }
}

/// Cached match if present; otherwise network with write-through.
pub async fn offline_first(cx: &StrategyCx, request: &InterceptRequest) -> Result<Resolved, Error> {
    if let Some(hit) = lookup(cx, request).await {
        return Ok(hit);
    }
    pass_through_and_cache(cx, request).await
}

/// Network first; the cached match only covers for an unusable network
/// result. With neither available the network failure propagates.
pub async fn online_first(cx: &StrategyCx, request: &InterceptRequest) -> Result<Resolved, Error> {
    match pass_through_and_cache(cx, request).await {
        Ok(resolved) if resolved.is_success() => Ok(resolved),
        Ok(resolved) => Ok(lookup(cx, request).await.unwrap_or(resolved)),
        Err(err) => match lookup(cx, request).await {
            Some(hit) => Ok(hit),
            None => Err(err),
        },
    }
}

/// Network and cache concurrently; first usable result wins.
///
/// The network leg is spawned detached so its write-through completes
/// even when the cache leg settles first. The loser is never cancelled;
/// it keeps the cache warm for the next request.
pub async fn race(cx: &StrategyCx, request: &InterceptRequest) -> Result<Resolved, Error> {
    let mut network = spawn_fetch(cx.clone(), request.clone());

    tokio::select! {
        hit = lookup(cx, request) => match hit {
            Some(resolved) => Ok(resolved),
            None => joined(network).await,
        },
        result = &mut network => {
            let resolved = result.map_err(|e| Error::NetworkFetch(format!("fetch task failed: {e}")))??;
            if resolved.is_success() {
                Ok(resolved)
            } else {
                match lookup(cx, request).await {
                    Some(hit) => Ok(hit),
                    None => Ok(resolved),
                }
            }
        }
    }
}

/// Always network; write through on success; a failed response returns
/// as-is with no cache fallback. Base building block for the rest.
pub async fn pass_through_and_cache(cx: &StrategyCx, request: &InterceptRequest) -> Result<Resolved, Error> {
    let response = match cx.net.fetch(&request.url).await {
        Ok(response) => {
            cx.connectivity.set_online(true);
            response
        }
        Err(err) => {
            cx.connectivity.set_online(false);
            return Err(err);
        }
    };

    if response.is_success() {
        let key = request.key();
        if let Err(err) = cx.store.put(&cx.generation, &key, &response.to_cached()).await {
            tracing::warn!(url = %request.url, error = %err, "cache write-through failed");
        }
    }

    Ok(Resolved::from_network(&response))
}

/// Cache lookup; store errors count as a miss.
async fn lookup(cx: &StrategyCx, request: &InterceptRequest) -> Option<Resolved> {
    let key = request.key();
    match cx.store.match_entry(&cx.generation, &key, cx.ignore_query).await {
        Ok(Some(entry)) => {
            tracing::debug!(url = %request.url, "cache hit");
            Some(Resolved::from_cached(entry, Source::Cache))
        }
        Ok(None) => None,
        Err(err) => {
            tracing::warn!(url = %request.url, error = %err, "cache read failed; treating as miss");
            None
        }
    }
}

fn spawn_fetch(cx: StrategyCx, request: InterceptRequest) -> JoinHandle<Result<Resolved, Error>> {
    tokio::spawn(async move { pass_through_and_cache(&cx, &request).await })
}

async fn joined(network: JoinHandle<Result<Resolved, Error>>) -> Result<Resolved, Error> {
    network
        .await
        .map_err(|e| Error::NetworkFetch(format!("fetch task failed: {e}")))?
}
