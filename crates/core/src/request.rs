//! Outbound request as seen by the cache layer.

use crate::Error;
use serde::{Deserialize, Serialize};
use url::Url;

/// How the page issued the request. Only navigations get the offline page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMode {
    Navigate,
    #[default]
    Subresource,
}

/// A request identity: method plus URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: Url,
    pub mode: RequestMode,
}

impl Request {
    pub fn new(method: &str, url: Url) -> Self {
        Self { method: method.to_ascii_uppercase(), url, mode: RequestMode::Subresource }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    /// A top-level page navigation.
    pub fn navigate(url: Url) -> Self {
        Self { mode: RequestMode::Navigate, ..Self::get(url) }
    }

    /// Parse an absolute URL into a GET request.
    pub fn parse_get(input: &str) -> Result<Self, Error> {
        let url = Url::parse(input.trim()).map_err(|e| Error::InvalidUrl(format!("{input}: {e}")))?;
        Ok(Self::get(url))
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    pub fn is_http(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Only GET requests over http(s) ever reach the cache.
    pub fn is_cacheable(&self) -> bool {
        self.is_get() && self.is_http()
    }
}
