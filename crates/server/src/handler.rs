//! MCP server handler implementation.
//!
//! Routes tool calls (resolve, control, cache_status) to the engine.

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

use overcast_engine::{ControlMessage, Engine};

use crate::tools::resolve::{ResolveParams, resolve_impl};
use crate::tools::control::control_impl;
use crate::tools::status::status_impl;

/// The main MCP server handler for overcastd.
#[derive(Clone)]
pub struct OvercastServer {
    engine: Engine,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
#[tool_router]
impl OvercastServer {
    pub fn new(engine: Engine) -> Self {
        Self { engine, tool_router: Self::tool_router() }
    }

    /// The interception entry point, exposed for hosts and debugging.
    #[tool(
        description = "Resolve a request through the cache layer: admission rules, offline short-circuit, strategy dispatch, fallback. Returns the disposition and response metadata."
    )]
    async fn resolve(&self, params: Parameters<ResolveParams>) -> Result<CallToolResult, McpError> {
        resolve_impl(&self.engine, params.0).await
    }

    /// The control channel.
    #[tool(
        description = "Send a control command envelope ({action, payload}). Known actions: refresh-precache, set-connectivity. Replies ack or nack to this caller only."
    )]
    async fn control(&self, params: Parameters<ControlMessage>) -> Result<CallToolResult, McpError> {
        control_impl(&self.engine, params.0).await
    }

    /// Operational introspection.
    #[tool(description = "Report lifecycle state, cache generations, the current one, and entry counts.")]
    async fn cache_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.engine).await
    }
}

impl ServerHandler for OvercastServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "overcast".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
