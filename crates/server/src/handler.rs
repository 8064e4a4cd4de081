//! MCP server handler implementation.
//!
//! Routes tool calls to the worker, the content client and the admin
//! controller.
use crate::tools::{
    CacheUrlsParams, FetchParams, PostGetParams, admin_impl, fetch_impl, post_get_impl, posts_list_impl,
};

use postcache_client::{Command, ContentClient, Worker, WorkerHandle};
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

/// The main MCP server handler for postcache.
#[derive(Clone)]
pub struct PostcacheServer {
    worker: Worker,
    content: ContentClient,
    admin: WorkerHandle,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl PostcacheServer {
    pub fn new(worker: Worker, admin: WorkerHandle) -> Self {
        let content = ContentClient::new(worker.clone());
        Self { worker, content, admin, tool_router: Self::tool_router() }
    }

    /// Route a request through the offline cache.
    #[tool(
        description = "Fetch a URL or site path through the offline cache. Returns status, headers, body and whether it came from cache, network, a fallback or the offline response."
    )]
    async fn fetch(&self, params: Parameters<FetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.worker, params.0).await
    }

    #[tool(description = "List blog posts from the content host, README first then newest file names first.")]
    async fn posts_list(&self) -> Result<CallToolResult, McpError> {
        posts_list_impl(&self.content).await
    }

    #[tool(description = "Fetch one blog post by file name. Returns frontmatter metadata and the markdown body.")]
    async fn post_get(&self, params: Parameters<PostGetParams>) -> Result<CallToolResult, McpError> {
        post_get_impl(&self.content, params.0).await
    }

    #[tool(description = "Report every cache partition with its entry count and up to 10 stored URLs.")]
    async fn cache_info(&self) -> Result<CallToolResult, McpError> {
        admin_impl(&self.admin, Command::GetCacheInfo).await
    }

    #[tool(description = "Delete every cache partition.")]
    async fn cache_clear(&self) -> Result<CallToolResult, McpError> {
        admin_impl(&self.admin, Command::ClearCache).await
    }

    #[tool(description = "Fetch and store the given URLs or site paths in the partition their class maps to.")]
    async fn cache_urls(&self, params: Parameters<CacheUrlsParams>) -> Result<CallToolResult, McpError> {
        admin_impl(&self.admin, Command::CacheUrls { urls: params.0.urls }).await
    }

    #[tool(description = "Skip the waiting phase and activate the installed worker now.")]
    async fn skip_waiting(&self) -> Result<CallToolResult, McpError> {
        admin_impl(&self.admin, Command::SkipWaiting).await
    }
}

impl ServerHandler for PostcacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "postcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Offline cache for a static blog. Use fetch for any site, CDN or content-host URL; \
                 posts_list and post_get for blog content; cache_* and skip_waiting to administer the cache."
                    .into(),
            ),
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
