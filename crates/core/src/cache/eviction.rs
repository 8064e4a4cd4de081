//! Size and age bounds on partitions.
//!
//! The two rules are independent. The size bound keeps at most N entries per
//! partition, dropping the oldest by cached-at first. The age bound makes an
//! entry expired once `now - cached_at >= max_age`; expired entries are swept
//! opportunistically and treated as misses by cache-first lookups, but are
//! still served when the network is unavailable.

use super::connection::CacheDb;
use super::entries::CachedEntry;
use crate::Error;
use chrono::{DateTime, Duration, Utc};
use tokio_rusqlite::params;

/// Whether an entry written at `cached_at` has outlived `max_age` at `now`.
pub fn is_expired(cached_at: DateTime<Utc>, max_age: Duration, now: DateTime<Utc>) -> bool {
    now - cached_at >= max_age
}

impl CachedEntry {
    /// Untagged entries have no provable age and count as expired.
    pub fn is_expired(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        self.cached_at().is_none_or(|at| is_expired(at, max_age, now))
    }
}

impl CacheDb {
    /// Delete the oldest entries until at most `max_entries` remain.
    ///
    /// Returns the number of deleted entries.
    pub async fn trim_partition(&self, partition: &str, max_entries: usize) -> Result<u64, Error> {
        let partition = partition.to_string();
        let max = max_entries as i64;
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE partition = ?1", params![partition], |row| {
                        row.get(0)
                    })?;
                if count <= max {
                    return Ok(0);
                }

                let to_delete = count - max;
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE rowid IN (
                        SELECT rowid FROM entries WHERE partition = ?1
                        ORDER BY cached_at ASC, rowid ASC LIMIT ?2
                    )",
                    params![partition, to_delete],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every entry of a partition that is expired at `now`.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_expired(&self, partition: &str, max_age: Duration, now: DateTime<Utc>) -> Result<u64, Error> {
        let partition = partition.to_string();
        let cutoff = (now - max_age).timestamp_millis();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE partition = ?1 AND cached_at <= ?2",
                    params![partition, cutoff],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::partitions::Partition;
    use crate::config::PartitionRole;
    use crate::{Request, Response};

    fn static_partition() -> Partition {
        Partition { name: "blog-static-v1".into(), role: PartitionRole::Static }
    }

    async fn fill(db: &CacheDb, n: i64, t0: DateTime<Utc>) {
        for i in 0..n {
            let req = Request::parse_get(&format!("https://example.com/{i}.css")).unwrap();
            db.put_entry(&static_partition(), &req, &Response::new(200, ""), t0 + Duration::seconds(i))
                .await
                .unwrap();
        }
    }

    #[test]
    fn test_expiry_boundary() {
        let t = Utc::now();
        let m = Duration::seconds(60);
        assert!(!is_expired(t, m, t));
        assert!(!is_expired(t, m, t + Duration::seconds(59)));
        assert!(is_expired(t, m, t + m));
        assert!(is_expired(t, m, t + Duration::seconds(61)));
    }

    #[test]
    fn test_untagged_entry_is_expired() {
        let entry = CachedEntry {
            partition: "p".into(),
            method: "GET".into(),
            url: "https://example.com/".into(),
            response: Response::new(200, ""),
        };
        assert!(entry.is_expired(Duration::days(7), Utc::now()));
    }

    #[tokio::test]
    async fn test_trim_keeps_newest() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let t0 = Utc::now();
        fill(&db, 5, t0).await;

        let deleted = db.trim_partition("blog-static-v1", 3).await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(db.entry_count("blog-static-v1").await.unwrap(), 3);

        let urls = db.entry_urls("blog-static-v1", 10).await.unwrap();
        assert_eq!(
            urls,
            vec!["https://example.com/2.css", "https://example.com/3.css", "https://example.com/4.css"]
        );
    }

    #[tokio::test]
    async fn test_trim_under_bound_is_noop() {
        let db = CacheDb::open_in_memory().await.unwrap();
        fill(&db, 2, Utc::now()).await;
        assert_eq!(db.trim_partition("blog-static-v1", 3).await.unwrap(), 0);
        assert_eq!(db.entry_count("blog-static-v1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_trim_only_touches_one_partition() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let t0 = Utc::now();
        fill(&db, 3, t0).await;
        let other = Partition { name: "blog-dynamic-v1".into(), role: PartitionRole::Dynamic };
        db.put_entry(&other, &Request::parse_get("https://example.com/x").unwrap(), &Response::new(200, ""), t0)
            .await
            .unwrap();

        db.trim_partition("blog-static-v1", 1).await.unwrap();
        assert_eq!(db.entry_count("blog-dynamic-v1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let t0 = Utc::now();
        fill(&db, 4, t0).await;

        // entries at t0+0 .. t0+3; max_age 10s; now = t0+12 -> 0,1,2 expired
        let deleted = db
            .purge_expired("blog-static-v1", Duration::seconds(10), t0 + Duration::seconds(12))
            .await
            .unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(db.entry_urls("blog-static-v1", 10).await.unwrap(), vec!["https://example.com/3.css"]);
    }
}
