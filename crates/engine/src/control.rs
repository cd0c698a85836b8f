//! Out-of-band control commands.
//!
//! Commands arrive as `{action, payload}` envelopes from one peer client;
//! the reply goes back to that peer alone, never broadcast. Unknown
//! actions produce a nack, never a crash.

use serde::{Deserialize, Serialize};

use crate::{Engine, lifecycle};
use overcast_core::Error;

/// Re-read a manifest and refresh the current generation's precache.
/// Payload: manifest URL string, or null for the configured one.
pub const ACTION_REFRESH_PRECACHE: &str = "refresh-precache";

/// Update the ambient connectivity signal. Payload: boolean. The peer
/// client forwards its online/offline transitions through this.
pub const ACTION_SET_CONNECTIVITY: &str = "set-connectivity";

/// A command envelope from a peer client.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ControlMessage {
    pub action: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// The outcome envelope posted back to the originating peer.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ControlReply {
    /// "ack" on success, "nack" otherwise.
    pub action: String,
    pub detail: String,
}

impl ControlReply {
    fn ack(detail: impl Into<String>) -> Self {
        Self { action: "ack".into(), detail: detail.into() }
    }

    fn nack(detail: impl Into<String>) -> Self {
        Self { action: "nack".into(), detail: detail.into() }
    }

    pub fn is_ack(&self) -> bool {
        self.action == "ack"
    }
}

pub(crate) async fn handle(engine: &Engine, message: ControlMessage) -> ControlReply {
    match message.action.as_str() {
        ACTION_REFRESH_PRECACHE => refresh(engine, message.payload).await,
        ACTION_SET_CONNECTIVITY => set_connectivity(engine, message.payload),
        other => {
            let err = Error::UnknownAction(other.to_string());
            tracing::warn!(action = other, "control message not recognized");
            ControlReply::nack(err.to_string())
        }
    }
}

async fn refresh(engine: &Engine, payload: serde_json::Value) -> ControlReply {
    let manifest_url = match payload {
        serde_json::Value::Null => None,
        serde_json::Value::String(url) => Some(url),
        _ => return ControlReply::nack("refresh-precache payload must be a manifest URL string or null"),
    };

    match lifecycle::refresh_precache(engine, manifest_url).await {
        Ok(stored) => ControlReply::ack(format!("{stored} assets refreshed")),
        Err(err) => ControlReply::nack(err.to_string()),
    }
}

fn set_connectivity(engine: &Engine, payload: serde_json::Value) -> ControlReply {
    match payload.as_bool() {
        Some(online) => {
            engine.connectivity.set_online(online);
            ControlReply::ack(format!("connectivity set to {}", if online { "online" } else { "offline" }))
        }
        None => ControlReply::nack("set-connectivity payload must be a boolean"),
    }
}
