//! Upstream content client error types.

/// Errors from the upstream content client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UpstreamError {
    /// Upstream answered with a rate-limit status and nothing was cached.
    #[error("rate limited: upstream returned {status}")]
    RateLimited { status: u16 },

    /// The requested listing or post does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-success response.
    #[error("HTTP error: {status}")]
    Http { status: u16 },

    /// Neither network nor cache could answer.
    #[error("offline: {0}")]
    Offline(String),

    /// Response body could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// The post body is blank.
    #[error("post content is empty: {0}")]
    Empty(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl From<UpstreamError> for postcache_core::Error {
    fn from(err: UpstreamError) -> Self {
        use postcache_core::Error;
        match err {
            UpstreamError::RateLimited { .. } => Error::RateLimited(err.to_string()),
            UpstreamError::NotFound(_) | UpstreamError::Http { .. } => Error::HttpError(err.to_string()),
            UpstreamError::Offline(_) => Error::Network(err.to_string()),
            UpstreamError::Parse(_) | UpstreamError::Empty(_) => Error::CorruptEntry(err.to_string()),
            UpstreamError::InvalidUrl(_) => Error::InvalidUrl(err.to_string()),
        }
    }
}
