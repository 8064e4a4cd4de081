//! HTTP-shaped response snapshots and the synthetic offline responses.
//!
//! Every failure the cache layer cannot recover from is turned into one of
//! the constructors here, so callers always receive a well-formed response
//! with a status, a status text, a content type and a machine-readable body.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

pub const CONTENT_TYPE: &str = "content-type";

/// An immutable snapshot of a response: status, headers and body.
///
/// Header names are stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            status_text: reason_phrase(status).to_string(),
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE)
    }

    /// 2xx.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// JSON 503 returned when an API request has neither network nor cache.
    pub fn offline_json(message: &str, now: DateTime<Utc>) -> Self {
        let body = serde_json::json!({
            "error": "Network unavailable",
            "message": message,
            "timestamp": now.to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        Self::new(503, body.to_string()).with_header(CONTENT_TYPE, "application/json")
    }

    /// Plain-text 503 for any other unresolvable request.
    pub fn offline_text() -> Self {
        Self::new(503, "Offline - Content not available").with_header(CONTENT_TYPE, "text/plain")
    }

    /// Self-contained offline document for failed navigations.
    pub fn offline_page() -> Self {
        Self::new(503, OFFLINE_HTML).with_header(CONTENT_TYPE, "text/html; charset=utf-8")
    }
}

/// Canonical reason phrase for the statuses this layer produces or relays.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}

const OFFLINE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Offline</title>
<style>
body { font-family: system-ui, sans-serif; display: flex; min-height: 100vh; margin: 0;
       align-items: center; justify-content: center; background: #111827; color: #e5e7eb; }
main { text-align: center; max-width: 28rem; padding: 2rem; }
button { margin-top: 1.5rem; padding: .6rem 1.4rem; border: 0; border-radius: .4rem;
         background: #2563eb; color: #fff; font-size: 1rem; cursor: pointer; }
</style>
</head>
<body>
<main>
<h1>You are offline</h1>
<p>This page is not available offline yet. Check your connection and try again.</p>
<button type="button" onclick="window.location.reload()">Retry</button>
</main>
</body>
</html>
"#;
