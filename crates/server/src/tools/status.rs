//! cache_status tool implementation.
//!
//! Operational introspection: lifecycle state, generations, entry counts.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use overcast_core::Error;
use overcast_engine::Engine;

/// Output from the cache_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatusOutput {
    /// Lifecycle state: uninstalled, installing, installed, or active.
    pub state: String,
    /// The promoted generation, if any.
    pub current: Option<String>,
    pub generations: Vec<GenerationStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationStatus {
    pub name: String,
    pub entries: u64,
    pub current: bool,
}

/// Implementation of the cache_status tool.
pub async fn status_impl(engine: &Engine) -> Result<CallToolResult, McpError> {
    let state = engine.lifecycle().state().await.to_string();
    let current = engine.lifecycle().current().await;

    let mut generations = Vec::new();
    for generation in engine.store().list_generations().await? {
        let entries = engine.store().count_entries(&generation).await?;
        generations.push(GenerationStatus {
            name: generation.name().to_string(),
            entries,
            current: Some(&generation) == current.as_ref(),
        });
    }

    let output = CacheStatusOutput { state, current: current.map(|g| g.name().to_string()), generations };

    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
