//! MCP server handler implementation.
//!
//! The handler owns the worker and routes each tool call either to a
//! lifecycle signal or to a cache inspection query.
use std::sync::Arc;

use crate::tools::cache::{CacheGetParams, generations_impl, get_impl};
use crate::tools::fetch::{FetchParams, fetch_impl};
use crate::tools::lifecycle::{SyncParams, activate_impl, install_impl, sync_impl};

use precache_client::ServiceWorker;
use precache_core::CacheDb;
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

/// Hosting environment for one [`ServiceWorker`].
#[derive(Clone)]
pub struct PrecacheHost {
    worker: Arc<ServiceWorker>,
    cache: CacheDb,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl PrecacheHost {
    pub fn new(worker: Arc<ServiceWorker>, cache: CacheDb) -> Self {
        Self { worker, cache, tool_router: Self::tool_router() }
    }

    #[tool(description = "Deliver the install signal: fetch every seed URL and store them in the current cache generation.")]
    async fn sw_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.worker).await
    }

    #[tool(description = "Deliver the activate signal: delete every cache generation except the current one.")]
    async fn sw_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.worker).await
    }

    /// Run one request through the worker's fetch handler.
    ///
    /// Local GETs are served cache-first with an offline fallback; external
    /// GETs network-first. Anything else is reported back as a bypass.
    #[tool(
        description = "Deliver a fetch to the worker. Returns the served response and its source (network, cache, fallback), or a bypass."
    )]
    async fn sw_fetch(&self, params: Parameters<FetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.worker, params.0).await
    }

    #[tool(description = "Deliver a background sync event with the given tag.")]
    async fn sw_sync(&self, params: Parameters<SyncParams>) -> Result<CallToolResult, McpError> {
        sync_impl(&self.worker, params.0).await
    }

    #[tool(description = "List cache generations and the entries stored in each.")]
    async fn cache_generations(&self) -> Result<CallToolResult, McpError> {
        generations_impl(&self.worker, &self.cache).await
    }

    #[tool(description = "Read the stored response for a URL from a cache generation (default: current).")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.worker, &self.cache, params.0).await
    }
}

impl ServerHandler for PrecacheHost {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "precache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(format!(
                "Resource cache for {} (generation {}).",
                self.worker.config().origin,
                self.worker.generation()
            )),
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
