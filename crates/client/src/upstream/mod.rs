//! Upstream content client.
//!
//! Reads the posts listing and individual posts from the content host. Every
//! request is routed through the [`Worker`], so listings and posts are served
//! from cache when the host is unreachable or rate-limits us.
//!
//! ### Endpoints
//!
//! - **Listing**: `https://{api_host}/repos/{owner}/{repo}/contents/{posts_path}?ref={branch}`
//!   returns `[{name, download_url, size, sha, type}]`.
//! - **Post**: raw markdown, optionally led by a `---` frontmatter block.

pub mod error;
pub mod frontmatter;
pub mod response;

pub use error::UpstreamError;
pub use frontmatter::Frontmatter;
pub use response::{FileDescriptor, Post, PostSummary};

use crate::strategy::{Outcome, Source};
use crate::worker::Worker;
use postcache_core::{Request, UpstreamConfig};

#[derive(Clone)]
pub struct ContentClient {
    worker: Worker,
}

impl ContentClient {
    pub fn new(worker: Worker) -> Self {
        Self { worker }
    }

    fn upstream(&self) -> &UpstreamConfig {
        &self.worker.config().upstream
    }

    /// Markdown posts, README first, then newest file names first.
    pub async fn list_posts(&self) -> Result<Vec<PostSummary>, UpstreamError> {
        let url = self.upstream().posts_list_url();
        let outcome = self.get(&url).await?;

        let files: Vec<FileDescriptor> =
            serde_json::from_slice(&outcome.response.body).map_err(|e| UpstreamError::Parse(e.to_string()))?;

        let posts: Vec<PostSummary> = response::order_posts(files)
            .into_iter()
            .map(|file| PostSummary {
                title: response::title_from_name(&file.name),
                url: file.download_url.unwrap_or_else(|| self.upstream().post_content_url(&file.name)),
                name: file.name,
                size: file.size,
                sha: file.sha,
            })
            .collect();

        tracing::debug!(count = posts.len(), source = ?outcome.source, "listed posts");
        Ok(posts)
    }

    /// Fetch a post from its listing entry.
    pub async fn fetch_post(&self, summary: &PostSummary) -> Result<Post, UpstreamError> {
        self.fetch_post_at(&summary.name, &summary.url).await
    }

    /// Fetch a post by file name from the raw-content host.
    pub async fn fetch_post_by_name(&self, name: &str) -> Result<Post, UpstreamError> {
        let url = self.upstream().post_content_url(name);
        self.fetch_post_at(name, &url).await
    }

    async fn fetch_post_at(&self, name: &str, url: &str) -> Result<Post, UpstreamError> {
        let outcome = self.get(url).await?;
        let content = outcome.response.text();
        if content.trim().is_empty() {
            return Err(UpstreamError::Empty(name.to_string()));
        }

        let (metadata, body) = frontmatter::parse(&content);
        let title = metadata.title.clone().unwrap_or_else(|| response::title_from_name(name));
        Ok(Post { name: name.to_string(), title, body: body.to_string(), metadata, source: outcome.source })
    }

    /// GET through the worker and map failures to [`UpstreamError`].
    async fn get(&self, url: &str) -> Result<Outcome, UpstreamError> {
        let request = Request::parse_get(url).map_err(|e| UpstreamError::InvalidUrl(e.to_string()))?;
        let outcome = self.worker.handle_fetch(&request).await;
        let status = outcome.response.status;

        if outcome.source == Source::Offline {
            return Err(UpstreamError::Offline(url.to_string()));
        }
        if outcome.response.is_ok() {
            return Ok(outcome);
        }
        if self.worker.config().is_rate_limit_status(status) {
            return Err(UpstreamError::RateLimited { status });
        }
        if status == 404 {
            return Err(UpstreamError::NotFound(url.to_string()));
        }
        Err(UpstreamError::Http { status })
    }
}
