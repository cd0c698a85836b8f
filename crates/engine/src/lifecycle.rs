//! Install, activate, and refresh orchestration.
//!
//! The lifecycle controller is the only component that creates, promotes,
//! or deletes generations. Install populates a fresh generation and
//! promotes it; activation evicts everything else and then claims open
//! clients. A failed install leaves the previously promoted generation
//! authoritative; the store must never drop from one usable generation
//! to zero.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::Engine;
use overcast_client::manifest;
use overcast_core::{AppConfig, Error, Generation, RequestKey};

/// Lifecycle states. `Active` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninstalled,
    Installing,
    Installed,
    Active,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Uninstalled => write!(f, "uninstalled"),
            LifecycleState::Installing => write!(f, "installing"),
            LifecycleState::Installed => write!(f, "installed"),
            LifecycleState::Active => write!(f, "active"),
        }
    }
}

struct LifecycleInner {
    state: RwLock<LifecycleState>,
    current: RwLock<Option<Generation>>,
    /// Serializes install/activate/refresh against each other. Competing
    /// installs of the same deployment queue here; the loser observes the
    /// winner's promoted generation and no-ops.
    gate: Mutex<()>,
}

/// Shared lifecycle cell. Clones observe the same state.
#[derive(Clone)]
pub struct Lifecycle {
    inner: Arc<LifecycleInner>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(LifecycleInner {
                state: RwLock::new(LifecycleState::Uninstalled),
                current: RwLock::new(None),
                gate: Mutex::new(()),
            }),
        }
    }

    pub async fn state(&self) -> LifecycleState {
        *self.inner.state.read().await
    }

    pub async fn current(&self) -> Option<Generation> {
        self.inner.current.read().await.clone()
    }

    /// True once a generation is promoted and activation has run.
    pub async fn ready(&self) -> bool {
        self.state().await == LifecycleState::Active && self.current().await.is_some()
    }

    async fn set_state(&self, state: LifecycleState) {
        *self.inner.state.write().await = state;
    }

    async fn set_current(&self, generation: Generation) {
        *self.inner.current.write().await = Some(generation);
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Install: load the manifest, precache a fresh generation, promote it,
/// and request immediate activation.
pub(crate) async fn install(engine: &Engine) -> Result<Generation, Error> {
    let lifecycle = &engine.lifecycle;
    let _gate = lifecycle.inner.gate.lock().await;

    let target = Generation::new(&engine.config.cache_name_prefix, &engine.config.cache_version);
    if lifecycle.current().await.as_ref() == Some(&target) {
        tracing::info!(generation = %target, "generation already installed");
        return Ok(target);
    }

    let resumed_state = lifecycle.state().await;
    lifecycle.set_state(LifecycleState::Installing).await;
    tracing::info!(generation = %target, "installing");

    match populate(engine, &target).await {
        Ok(entries) => {
            lifecycle.set_current(target.clone()).await;
            lifecycle.set_state(LifecycleState::Installed).await;
            tracing::info!(generation = %target, entries, "install complete; requesting immediate activation");
            Ok(target)
        }
        Err(err) => {
            // A half-populated generation must not survive, and the
            // previously promoted one stays authoritative.
            if let Err(cleanup) = engine.store.delete_generation(&target).await {
                tracing::warn!(generation = %target, error = %cleanup, "failed to discard aborted install");
            }
            lifecycle.set_state(resumed_state).await;
            tracing::error!(generation = %target, error = %err, "install failed");
            Err(err)
        }
    }
}

/// Activate: restore the current generation if this process has not
/// installed one itself, evict every other generation, then claim open
/// clients. Eviction strictly precedes claiming.
pub(crate) async fn activate(engine: &Engine) -> Result<(), Error> {
    let lifecycle = &engine.lifecycle;
    let _gate = lifecycle.inner.gate.lock().await;

    let current = match lifecycle.current().await {
        Some(generation) => generation,
        None => match engine.store.current_generation().await? {
            Some(generation) => {
                tracing::info!(generation = %generation, "recovered promoted generation from store");
                lifecycle.set_current(generation.clone()).await;
                generation
            }
            None => return Err(Error::NotReady("activate before any successful install".into())),
        },
    };

    match engine.store.list_generations().await {
        Ok(generations) => {
            for generation in generations {
                if generation == current {
                    continue;
                }
                match engine.store.delete_generation(&generation).await {
                    Ok(()) => tracing::info!(generation = %generation, "evicted stale generation"),
                    Err(err) => {
                        tracing::warn!(generation = %generation, error = %err, "eviction failed; retried on next activation");
                    }
                }
            }
        }
        Err(err) => tracing::warn!(error = %err, "could not enumerate generations; eviction skipped"),
    }

    lifecycle.set_state(LifecycleState::Active).await;
    tracing::info!(generation = %current, "activated and claimed open clients");
    Ok(())
}

/// Control-channel refresh: re-read a manifest and write its assets into
/// the *current* generation. Unlike install this never voids the batch;
/// the current cache stays serviceable throughout, and a parse failure
/// leaves it untouched.
pub(crate) async fn refresh_precache(engine: &Engine, manifest_url: Option<String>) -> Result<usize, Error> {
    let lifecycle = &engine.lifecycle;
    let _gate = lifecycle.inner.gate.lock().await;

    let Some(current) = lifecycle.current().await else {
        return Err(Error::NotReady("refresh before any successful install".into()));
    };

    let manifest_url = match manifest_url {
        Some(given) => engine.config.resolve_url(&given)?,
        None => engine.config.manifest_url()?,
    };
    let urls = manifest::load(engine.net.as_ref(), &manifest_url).await?;

    let mut stored = 0usize;
    let mut failed = 0usize;
    for url in &urls {
        match fetch_and_store(engine, &current, url).await {
            Ok(()) => stored += 1,
            Err(err) => {
                tracing::warn!(url = %url, error = %err, "refresh skipped asset");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(Error::PrecacheBatch(format!("{failed} of {} assets failed to refresh", urls.len())));
    }
    tracing::info!(generation = %current, stored, "precache refreshed");
    Ok(stored)
}

/// Load the manifest, fill the target generation, and promote it. Returns
/// the number of precached URLs; the first failure voids the whole batch,
/// leaving the promotion untouched.
async fn populate(engine: &Engine, target: &Generation) -> Result<usize, Error> {
    let manifest_url = engine.config.manifest_url()?;
    let manifest_urls = manifest::load(engine.net.as_ref(), &manifest_url).await?;
    let urls = precache_list(&engine.config, &manifest_urls)?;

    engine.store.open_generation(target).await?;
    for url in &urls {
        fetch_and_store(engine, target, url)
            .await
            .map_err(|err| match err {
                err @ Error::Cache(_) => err,
                err => Error::PrecacheBatch(format!("{url}: {err}")),
            })?;
    }
    engine.store.set_current(target).await?;
    Ok(urls.len())
}

/// The combined precache list: the fixed always-set first, then manifest
/// URLs, resolved against the origin and deduplicated in order.
fn precache_list(config: &AppConfig, manifest_urls: &[String]) -> Result<Vec<String>, Error> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();
    for url in config.precache_always.iter().chain(manifest_urls) {
        let resolved = config.resolve_url(url)?;
        if seen.insert(resolved.clone()) {
            urls.push(resolved);
        }
    }
    Ok(urls)
}

async fn fetch_and_store(engine: &Engine, generation: &Generation, url: &str) -> Result<(), Error> {
    let resolved = engine.config.resolve_url(url)?;
    let response = engine.net.fetch(&resolved).await?;
    if !response.is_success() {
        return Err(Error::NetworkFetch(format!("status {}", response.status)));
    }
    let key = RequestKey::get(&resolved);
    engine.store.put(generation, &key, &response.to_cached()).await
}
