//! Structured errors for the postcache server.
//!
//! Core and upstream errors reuse the core numeric codes; the variants here
//! cover what only the tool layer can get wrong.

use postcache_client::UpstreamError;
use rmcp::model::{ErrorCode, ErrorData as McpError};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Invalid input parameters (e.g., a post name with a path in it).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// The admin controller answered with `success: false`.
    #[error("ADMIN_FAILED: {0}")]
    AdminFailed(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Core(#[from] postcache_core::Error),
}

impl From<ServerError> for McpError {
    fn from(err: ServerError) -> Self {
        let (code, message) = match err {
            ServerError::InvalidInput(msg) => (-32602, msg),
            ServerError::AdminFailed(msg) => (-32000, msg),
            ServerError::Upstream(e) => return postcache_core::Error::from(e).into(),
            ServerError::Core(e) => return e.into(),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_code() {
        let err: McpError = ServerError::from(UpstreamError::RateLimited { status: 403 }).into();
        assert_eq!(err.code.0, -32010);
    }

    #[test]
    fn test_admin_failed_code() {
        let err: McpError = ServerError::AdminFailed("INVALID_INPUT: urls cannot be empty".into()).into();
        assert_eq!(err.code.0, -32000);
        assert!(err.message.contains("urls cannot be empty"));
    }
}
