//! fetch tool implementation.
//!
//! Routes a GET through the worker exactly like a page request would be.

use crate::tools::json_result;
use postcache_client::fetch::resolve;
use postcache_client::{Classification, Source, Worker};
use postcache_core::{Error, Request, RequestMode};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Input parameters for the fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchParams {
    /// Absolute URL, or a path resolved against the site origin.
    pub url: String,

    /// Treat the request as a top-level page navigation (offline page on failure).
    #[serde(default)]
    pub navigate: bool,

    /// HTTP method (default: GET). Anything but GET bypasses the cache.
    #[serde(default)]
    pub method: Option<String>,
}

/// Output from the fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchOutput {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
    /// cache, network, fallback or offline.
    pub source: String,
    /// Request class, absent for bypassed requests.
    pub class: Option<String>,
}

fn label<T: Serialize>(value: T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_default()
}

/// Implementation of the fetch tool.
pub async fn fetch_impl(worker: &Worker, params: FetchParams) -> Result<CallToolResult, McpError> {
    let url = resolve(&params.url, worker.dispatcher().origin()).map_err(Error::from)?;
    let mut request = Request::new(params.method.as_deref().unwrap_or("GET"), url);
    if params.navigate {
        request.mode = RequestMode::Navigate;
    }

    let outcome = worker.handle_fetch(&request).await;
    let output = FetchOutput {
        url: request.url.to_string(),
        status: outcome.response.status,
        status_text: outcome.response.status_text.clone(),
        headers: outcome.response.headers.clone(),
        body: outcome.response.text().into_owned(),
        source: label::<Source>(outcome.source),
        class: outcome.class.map(label::<Classification>),
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{first_text, test_support::fixture};

    fn params(url: &str) -> FetchParams {
        FetchParams { url: url.into(), navigate: false, method: None }
    }

    #[tokio::test]
    async fn test_fetch_relative_path_is_cached() {
        let fx = fixture().await;
        fx.fetcher.respond("https://bambans.github.io/css/style.css", "body{}");

        let first = fetch_impl(&fx.worker, params("/css/style.css")).await.unwrap();
        let first: FetchOutput = serde_json::from_str(&first_text(&first)).unwrap();
        assert_eq!(first.source, "network");
        assert_eq!(first.class.as_deref(), Some("static-asset"));

        let second = fetch_impl(&fx.worker, params("/css/style.css")).await.unwrap();
        let second: FetchOutput = serde_json::from_str(&first_text(&second)).unwrap();
        assert_eq!(second.source, "cache");
        assert_eq!(second.body, "body{}");
        assert!(second.headers.contains_key("x-sw-cached-at"));
    }

    #[tokio::test]
    async fn test_fetch_offline_navigation() {
        let fx = fixture().await;
        let result = fetch_impl(
            &fx.worker,
            FetchParams { url: "/blog/posts/missing".into(), navigate: true, method: None },
        )
        .await
        .unwrap();
        let output: FetchOutput = serde_json::from_str(&first_text(&result)).unwrap();
        assert_eq!(output.status, 503);
        assert_eq!(output.source, "offline");
        assert!(output.body.contains("<html"));
    }

    #[tokio::test]
    async fn test_fetch_post_method_bypasses() {
        let fx = fixture().await;
        fx.fetcher.respond("https://bambans.github.io/", "home");
        let result = fetch_impl(
            &fx.worker,
            FetchParams { url: "/".into(), navigate: false, method: Some("post".into()) },
        )
        .await
        .unwrap();
        let output: FetchOutput = serde_json::from_str(&first_text(&result)).unwrap();
        assert_eq!(output.class, None);
        assert_eq!(output.source, "network");
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let fx = fixture().await;
        assert!(fetch_impl(&fx.worker, params("ftp://example.com/x")).await.is_err());
    }
}
