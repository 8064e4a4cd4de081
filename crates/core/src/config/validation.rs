//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_prefix` or `cache_version` is empty
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_bytes`, `max_entries_*` or `max_age_secs` is 0
    /// - `site_origin` is not an http(s) URL
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_prefix.is_empty() {
            return Err(ConfigError::Invalid { field: "cache_prefix".into(), reason: "must not be empty".into() });
        }
        if self.cache_version.is_empty() {
            return Err(ConfigError::Invalid { field: "cache_version".into(), reason: "must not be empty".into() });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.max_entries_static == 0 {
            return Err(ConfigError::Invalid {
                field: "max_entries_static".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.max_entries_dynamic == 0 {
            return Err(ConfigError::Invalid {
                field: "max_entries_dynamic".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.max_age_secs == 0 {
            return Err(ConfigError::Invalid { field: "max_age_secs".into(), reason: "must be greater than 0".into() });
        }

        let origin = self.site_origin_url()?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                field: "site_origin".into(),
                reason: format!("unsupported scheme: {}", origin.scheme()),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if let Some(path) = self.static_assets.iter().find(|p| !p.starts_with('/')) {
            return Err(ConfigError::Invalid {
                field: "static_assets".into(),
                reason: format!("path must start with '/': {path}"),
            });
        }

        if !self.static_assets.contains(&self.offline_page) {
            tracing::warn!(
                offline_page = %self.offline_page,
                "offline_page is not pre-declared in static_assets; \
                 failed navigations will get the built-in page"
            );
        }

        Ok(())
    }
}
