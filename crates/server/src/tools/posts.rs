//! posts_list and post_get tool implementations.

use crate::error::ServerError;
use crate::tools::json_result;
use postcache_client::{ContentClient, PostSummary};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the post_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PostGetParams {
    /// File name inside the posts directory, e.g. `2024-01-01-hello.md`.
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PostsListOutput {
    pub posts: Vec<PostSummary>,
}

pub async fn posts_list_impl(content: &ContentClient) -> Result<CallToolResult, McpError> {
    let posts = content.list_posts().await.map_err(ServerError::from)?;
    json_result(&PostsListOutput { posts })
}

pub async fn post_get_impl(content: &ContentClient, params: PostGetParams) -> Result<CallToolResult, McpError> {
    let name = params.name.trim();
    if name.is_empty() || name.contains('/') {
        return Err(ServerError::InvalidInput(format!("invalid post name: {:?}", params.name)).into());
    }
    let post = content.fetch_post_by_name(name).await.map_err(ServerError::from)?;
    json_result(&post)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{first_text, test_support::fixture};

    #[tokio::test]
    async fn test_posts_list() {
        let fx = fixture().await;
        let listing = fx.worker.config().upstream.posts_list_url();
        fx.fetcher.respond(
            &listing,
            r#"[{"name":"a.md","download_url":null,"size":1,"sha":"x","type":"file"},
                {"name":"README.md","download_url":null,"size":1,"sha":"y","type":"file"}]"#,
        );

        let content = ContentClient::new(fx.worker.clone());
        let result = posts_list_impl(&content).await.unwrap();
        let output: PostsListOutput = serde_json::from_str(&first_text(&result)).unwrap();
        assert_eq!(output.posts[0].name, "README.md");
        assert_eq!(output.posts[1].title, "a");
    }

    #[tokio::test]
    async fn test_post_get() {
        let fx = fixture().await;
        let url = fx.worker.config().upstream.post_content_url("a.md");
        fx.fetcher.respond(&url, "---\ntitle: A post\n---\nhello");

        let content = ContentClient::new(fx.worker.clone());
        let result = post_get_impl(&content, PostGetParams { name: "a.md".into() }).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&first_text(&result)).unwrap();
        assert_eq!(value["title"], "A post");
        assert_eq!(value["body"], "hello");
    }

    #[tokio::test]
    async fn test_post_get_rejects_paths() {
        let fx = fixture().await;
        let content = ContentClient::new(fx.worker.clone());
        let err = post_get_impl(&content, PostGetParams { name: "../secrets".into() }).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }

    #[tokio::test]
    async fn test_posts_list_offline() {
        let fx = fixture().await;
        let content = ContentClient::new(fx.worker.clone());
        let err = posts_list_impl(&content).await.unwrap_err();
        assert_eq!(err.code.0, -32008);
    }
}
