//! overcastd entry point.
//!
//! Boots the engine (load config, open the store, install, activate),
//! then serves the control and interception surface as MCP tools on stdio
//! transport. Logging goes to stderr so stdout stays clean for the
//! JSON-RPC protocol.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

use overcast_client::{FetchConfig, NetClient};
use overcast_core::{AppConfig, CacheStore};
use overcast_engine::Engine;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = Arc::new(AppConfig::load()?);
    let store = CacheStore::open(&config.db_path).await?;
    let net = Arc::new(NetClient::new(FetchConfig::from_app(&config))?);
    let engine = Engine::new(config, store, net);

    if let Err(err) = engine.on_install().await {
        tracing::error!(error = %err, "install failed; any previously promoted generation keeps serving");
    }
    if let Err(err) = engine.on_activate().await {
        tracing::warn!(error = %err, "activation skipped");
    }

    tracing::info!("overcastd serving on stdio transport");

    let handler = handler::OvercastServer::new(engine);
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;

    Ok(())
}
