//! control tool implementation.
//!
//! The control channel: forwards the envelope to the engine and returns
//! the ack/nack outcome to the caller. A nack is still a successful tool
//! result; the protocol never throws for an unrecognized action.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};

use overcast_core::Error;
use overcast_engine::{ControlMessage, Engine};

/// Implementation of the control tool.
pub async fn control_impl(engine: &Engine, message: ControlMessage) -> Result<CallToolResult, McpError> {
    if message.action.is_empty() {
        return Err(Error::InvalidInput("action cannot be empty".into()).into());
    }

    let reply = engine.on_control_message(message).await;

    let json = serde_json::to_string_pretty(&reply)
        .map_err(|e| Error::InvalidInput(format!("failed to serialize reply: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
