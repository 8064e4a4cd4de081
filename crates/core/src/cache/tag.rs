//! Synthetic cached-at tag.
//!
//! Every stored response carries an injected `x-sw-cached-at` header holding
//! the write time. Age is computed from this tag alone; upstream caching
//! headers (`date`, `cache-control`, `expires`) are never consulted.

use crate::Response;
use chrono::{DateTime, SecondsFormat, Utc};

pub const CACHED_AT_HEADER: &str = "x-sw-cached-at";

/// Return a copy of `response` stamped with `now`.
pub fn stamp(response: &Response, now: DateTime<Utc>) -> Response {
    response
        .clone()
        .with_header(CACHED_AT_HEADER, now.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Read the cached-at tag. `None` for untagged or malformed values.
pub fn read(response: &Response) -> Option<DateTime<Utc>> {
    response
        .header(CACHED_AT_HEADER)
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_stamp_then_read() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let tagged = stamp(&Response::new(200, "body"), now);
        assert_eq!(read(&tagged), Some(now));
    }

    #[test]
    fn test_stamp_does_not_touch_original() {
        let original = Response::new(200, "body");
        let _ = stamp(&original, Utc::now());
        assert!(original.header(CACHED_AT_HEADER).is_none());
    }

    #[test]
    fn test_upstream_date_is_ignored() {
        let resp = Response::new(200, "").with_header("date", "Mon, 01 Jan 2024 00:00:00 GMT");
        assert_eq!(read(&resp), None);
    }

    #[test]
    fn test_malformed_tag() {
        let resp = Response::new(200, "").with_header(CACHED_AT_HEADER, "yesterday");
        assert_eq!(read(&resp), None);
    }
}
