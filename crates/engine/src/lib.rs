//! The overcast decision engine.
//!
//! This crate reframes the host-managed event model of a request
//! interceptor as explicit async entry points (`on_install`,
//! `on_activate`, `intercept`, `on_control_message`) callable from any
//! runtime that upholds the ordering invariants: install before
//! interception, one install at a time, activate after install.

pub mod classify;
pub mod control;
pub mod dispatch;
pub mod lifecycle;
pub mod request;
pub mod rules;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testutil;

use std::sync::Arc;

use overcast_client::Fetcher;
use overcast_core::{AppConfig, CacheStore, Error, Generation};

pub use control::{ControlMessage, ControlReply};
pub use dispatch::Disposition;
pub use lifecycle::{Lifecycle, LifecycleState};
pub use request::InterceptRequest;
pub use rules::Connectivity;
pub use strategy::{Resolved, Source};

/// The assembled cache layer: configuration, store, network, ambient
/// connectivity, and lifecycle state. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Engine {
    pub(crate) config: Arc<AppConfig>,
    pub(crate) store: CacheStore,
    pub(crate) net: Arc<dyn Fetcher>,
    pub(crate) connectivity: Connectivity,
    pub(crate) lifecycle: Lifecycle,
}

impl Engine {
    pub fn new(config: Arc<AppConfig>, store: CacheStore, net: Arc<dyn Fetcher>) -> Self {
        Self {
            config,
            store,
            net,
            connectivity: Connectivity::assume_online(),
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Install trigger: precache a fresh generation and promote it.
    ///
    /// Any failure leaves the previously promoted generation authoritative.
    pub async fn on_install(&self) -> Result<Generation, Error> {
        lifecycle::install(self).await
    }

    /// Activate trigger: evict stale generations, then claim open clients.
    pub async fn on_activate(&self) -> Result<(), Error> {
        lifecycle::activate(self).await
    }

    /// Per-request entry point. Never errors: internal failures degrade
    /// to pass-through, a fallback, or a generic failure response.
    pub async fn intercept(&self, request: &InterceptRequest) -> Disposition {
        dispatch::intercept(self, request).await
    }

    /// Out-of-band command from a peer client. The reply goes back to that
    /// peer alone.
    pub async fn on_control_message(&self, message: ControlMessage) -> ControlReply {
        control::handle(self, message).await
    }
}
