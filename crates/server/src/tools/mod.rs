//! MCP tool implementations.
//!
//! Each tool serializes its output as pretty-printed JSON text content.

pub mod admin;
pub mod fetch;
pub mod posts;

pub use admin::{CacheUrlsParams, admin_impl};
pub use fetch::{FetchParams, fetch_impl};
pub use posts::{PostGetParams, post_get_impl, posts_list_impl};

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

/// Wrap `output` as a successful tool result.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| McpError::internal_error(format!("Failed to serialize output: {e}"), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Text of the first content item, for tests.
#[cfg(test)]
pub(crate) fn first_text(result: &CallToolResult) -> String {
    let content_val = serde_json::to_value(&result.content[0]).unwrap();
    content_val
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content")
        .to_string()
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{TimeZone, Utc};
    use postcache_client::fetch::scripted::ScriptedFetcher;
    use postcache_client::{Worker, WorkerHandle, spawn_controller, worker::messages::DEFAULT_CAPACITY};
    use postcache_core::{AppConfig, CacheDb, ManualClock};
    use std::sync::Arc;

    pub struct Fixture {
        pub worker: Worker,
        pub admin: WorkerHandle,
        pub fetcher: Arc<ScriptedFetcher>,
    }

    /// A started worker with no pre-declared assets and a scripted network.
    pub async fn fixture() -> Fixture {
        let config = AppConfig {
            static_assets: vec![],
            third_party_assets: vec![],
            timeout_ms: 200,
            ..Default::default()
        };
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = Arc::new(ScriptedFetcher::new());
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        let worker = Worker::from_parts(Arc::new(config), db, fetcher.clone(), Arc::new(clock)).unwrap();
        worker.start().await.unwrap();
        let (admin, _task) = spawn_controller(worker.clone(), DEFAULT_CAPACITY);
        Fixture { worker, admin, fetcher }
    }
}
