//! Cache entry reads and writes.
//!
//! An entry is a (request identity, response snapshot) pair. Writes stamp the
//! snapshot with the cached-at tag and replace any previous entry for the
//! same request by deleting it and inserting a fresh row inside one
//! transaction. Rows are never updated in place.

use super::connection::CacheDb;
use super::hash::compute_entry_key;
use super::partitions::Partition;
use super::tag;
use crate::{Error, Request, Response};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};

/// A stored entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    pub partition: String,
    pub method: String,
    pub url: String,
    pub response: Response,
}

impl CachedEntry {
    /// Write time, read back from the injected tag.
    pub fn cached_at(&self) -> Option<DateTime<Utc>> {
        tag::read(&self.response)
    }
}

struct EntryRow {
    partition: String,
    method: String,
    url: String,
    status: u16,
    status_text: String,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    const COLUMNS: &'static str = "partition, method, url, status, status_text, headers_json, body";

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            partition: row.get(0)?,
            method: row.get(1)?,
            url: row.get(2)?,
            status: row.get(3)?,
            status_text: row.get(4)?,
            headers_json: row.get(5)?,
            body: row.get(6)?,
        })
    }

    fn into_entry(self) -> Result<CachedEntry, Error> {
        let headers: BTreeMap<String, String> = serde_json::from_str(&self.headers_json)?;
        Ok(CachedEntry {
            partition: self.partition,
            method: self.method,
            url: self.url,
            response: Response { status: self.status, status_text: self.status_text, headers, body: self.body },
        })
    }
}

impl CacheDb {
    /// Store `response` for `request`, stamped with `now`.
    ///
    /// Creates the partition on first write. Only GET requests are stored.
    pub async fn put_entry(
        &self, partition: &Partition, request: &Request, response: &Response, now: DateTime<Utc>,
    ) -> Result<CachedEntry, Error> {
        if !request.is_get() {
            return Err(Error::InvalidInput(format!("only GET requests are cached, got {}", request.method)));
        }

        let stamped = tag::stamp(response, now);
        let entry = CachedEntry {
            partition: partition.name.clone(),
            method: request.method.clone(),
            url: request.url.to_string(),
            response: stamped,
        };
        let key = compute_entry_key(&entry.method, &entry.url);
        let headers_json = serde_json::to_string(&entry.response.headers)?;
        let role = partition.role.as_str();
        let cached_at = now.timestamp_millis();
        let row = entry.clone();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO partitions (name, role, created_at) VALUES (?1, ?2, ?3)",
                    params![row.partition, role, Utc::now().to_rfc3339()],
                )?;
                tx.execute("DELETE FROM entries WHERE partition = ?1 AND key = ?2", params![row.partition, key])?;
                tx.execute(
                    "INSERT INTO entries
                        (partition, key, url, method, status, status_text, headers_json, body, cached_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        row.partition,
                        key,
                        row.url,
                        row.method,
                        row.response.status,
                        row.response.status_text,
                        headers_json,
                        row.response.body,
                        cached_at,
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(entry)
    }

    /// Look up the entry for `request` in one partition.
    pub async fn match_entry(&self, partition: &str, request: &Request) -> Result<Option<CachedEntry>, Error> {
        let partition = partition.to_string();
        let key = compute_entry_key(&request.method, request.url.as_str());
        let row = self
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let sql = format!("SELECT {} FROM entries WHERE partition = ?1 AND key = ?2", EntryRow::COLUMNS);
                let row = conn
                    .query_row(&sql, params![partition, key], EntryRow::from_row)
                    .optional()?;
                Ok(row)
            })
            .await
            .map_err(Error::from)?;

        row.map(EntryRow::into_entry).transpose()
    }

    /// Delete the entry for `request`. Returns false if there was none.
    pub async fn delete_entry(&self, partition: &str, request: &Request) -> Result<bool, Error> {
        let partition = partition.to_string();
        let key = compute_entry_key(&request.method, request.url.as_str());
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted =
                    conn.execute("DELETE FROM entries WHERE partition = ?1 AND key = ?2", params![partition, key])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn entry_count(&self, partition: &str) -> Result<u64, Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE partition = ?1", params![partition], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Up to `limit` stored URLs of a partition, oldest first.
    pub async fn entry_urls(&self, partition: &str, limit: usize) -> Result<Vec<String>, Error> {
        let partition = partition.to_string();
        let limit = limit as i64;
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT url FROM entries WHERE partition = ?1
                     ORDER BY cached_at ASC, rowid ASC LIMIT ?2",
                )?;
                let urls = stmt
                    .query_map(params![partition, limit], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PartitionRole;
    use chrono::Duration;

    fn dynamic() -> Partition {
        Partition { name: "blog-dynamic-v1".into(), role: PartitionRole::Dynamic }
    }

    fn get(url: &str) -> Request {
        Request::parse_get(url).unwrap()
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let now = Utc::now();
        let resp = Response::new(200, "# Hello").with_header("content-type", "text/plain");

        db.put_entry(&dynamic(), &get("https://example.com/post.md"), &resp, now)
            .await
            .unwrap();

        let entry = db
            .match_entry("blog-dynamic-v1", &get("https://example.com/post.md"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.response.status, 200);
        assert_eq!(entry.response.text(), "# Hello");
        assert_eq!(entry.response.content_type(), Some("text/plain"));
        assert_eq!(entry.cached_at().map(|t| t.timestamp_millis()), Some(now.timestamp_millis()));
    }

    #[tokio::test]
    async fn test_put_creates_partition() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(!db.has_partition("blog-dynamic-v1").await.unwrap());

        db.put_entry(&dynamic(), &get("https://example.com/"), &Response::new(200, ""), Utc::now())
            .await
            .unwrap();

        assert!(db.has_partition("blog-dynamic-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_rewrite_replaces_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let req = get("https://example.com/list");
        let t0 = Utc::now();

        db.put_entry(&dynamic(), &req, &Response::new(200, "old"), t0).await.unwrap();
        db.put_entry(&dynamic(), &req, &Response::new(200, "new"), t0 + Duration::seconds(5))
            .await
            .unwrap();

        assert_eq!(db.entry_count("blog-dynamic-v1").await.unwrap(), 1);
        let entry = db.match_entry("blog-dynamic-v1", &req).await.unwrap().unwrap();
        assert_eq!(entry.response.text(), "new");
        assert_eq!(entry.cached_at().unwrap().timestamp_millis(), (t0 + Duration::seconds(5)).timestamp_millis());
    }

    #[tokio::test]
    async fn test_non_get_rejected() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let req = Request::new("POST", url::Url::parse("https://example.com/").unwrap());
        let result = db.put_entry(&dynamic(), &req, &Response::new(200, ""), Utc::now()).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_match_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let result = db.match_entry("blog-dynamic-v1", &get("https://example.com/")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_delete_partition_cascades() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry(&dynamic(), &get("https://example.com/a"), &Response::new(200, ""), Utc::now())
            .await
            .unwrap();

        assert!(db.delete_partition("blog-dynamic-v1").await.unwrap());
        assert_eq!(db.entry_count("blog-dynamic-v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let req = get("https://example.com/a");
        db.put_entry(&dynamic(), &req, &Response::new(200, ""), Utc::now()).await.unwrap();

        assert!(db.delete_entry("blog-dynamic-v1", &req).await.unwrap());
        assert!(!db.delete_entry("blog-dynamic-v1", &req).await.unwrap());
    }

    #[tokio::test]
    async fn test_entry_urls_oldest_first() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let t0 = Utc::now();
        for (i, path) in ["c", "a", "b"].iter().enumerate() {
            db.put_entry(
                &dynamic(),
                &get(&format!("https://example.com/{path}")),
                &Response::new(200, ""),
                t0 + Duration::seconds(i as i64),
            )
            .await
            .unwrap();
        }

        let urls = db.entry_urls("blog-dynamic-v1", 2).await.unwrap();
        assert_eq!(urls, vec!["https://example.com/c", "https://example.com/a"]);
    }

    #[tokio::test]
    async fn test_migrate_keeps_target_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let old = Partition { name: "blog-dynamic-v0".into(), role: PartitionRole::Dynamic };
        let now = Utc::now();

        db.put_entry(&old, &get("https://example.com/a"), &Response::new(200, "old-a"), now)
            .await
            .unwrap();
        db.put_entry(&old, &get("https://example.com/b"), &Response::new(200, "old-b"), now)
            .await
            .unwrap();
        db.put_entry(&dynamic(), &get("https://example.com/a"), &Response::new(200, "new-a"), now)
            .await
            .unwrap();

        let copied = db.migrate_partition(&old.name, &dynamic()).await.unwrap();
        assert_eq!(copied, 1);

        let a = db.match_entry("blog-dynamic-v1", &get("https://example.com/a")).await.unwrap().unwrap();
        assert_eq!(a.response.text(), "new-a");
        let b = db.match_entry("blog-dynamic-v1", &get("https://example.com/b")).await.unwrap().unwrap();
        assert_eq!(b.response.text(), "old-b");
    }
}
