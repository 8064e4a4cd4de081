//! Admin tools: cache_info, cache_clear, cache_urls and skip_waiting.
//!
//! These post commands to the worker's admin controller and return the
//! reply's `data` payload.

use crate::error::ServerError;
use crate::tools::json_result;
use postcache_client::{Command, WorkerHandle};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the cache_urls tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheUrlsParams {
    /// Absolute URLs or site paths to fetch and store.
    pub urls: Vec<String>,
}

/// Post `command` and unwrap its reply.
pub async fn admin_impl(admin: &WorkerHandle, command: Command) -> Result<CallToolResult, McpError> {
    let reply = admin.post(command).await.map_err(ServerError::from)?;
    if !reply.success {
        let reason = reply.error.unwrap_or_else(|| "unknown failure".into());
        return Err(ServerError::AdminFailed(reason).into());
    }
    json_result(&reply.data.unwrap_or(serde_json::Value::Null))
}
