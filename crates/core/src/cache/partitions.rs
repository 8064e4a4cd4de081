//! Named, versioned cache partitions.
//!
//! The [`PartitionRegistry`] is computed once from the configured prefix and
//! version and names the one current partition per role. Everything else the
//! store holds is stale and is removed at activation.

use super::connection::CacheDb;
use crate::Error;
use crate::config::{AppConfig, PartitionRole};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::OptionalExtension;

/// A partition name with its role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Partition {
    pub name: String,
    pub role: PartitionRole,
}

/// The current partition names for one cache version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRegistry {
    static_partition: Partition,
    dynamic_partition: Partition,
}

impl PartitionRegistry {
    pub fn new(prefix: &str, version: &str) -> Self {
        let named = |role: PartitionRole| Partition { name: format!("{prefix}-{}-v{version}", role.as_str()), role };
        Self { static_partition: named(PartitionRole::Static), dynamic_partition: named(PartitionRole::Dynamic) }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.cache_prefix, &config.cache_version)
    }

    pub fn current(&self, role: PartitionRole) -> &Partition {
        match role {
            PartitionRole::Static => &self.static_partition,
            PartitionRole::Dynamic => &self.dynamic_partition,
        }
    }

    pub fn is_current(&self, name: &str) -> bool {
        self.static_partition.name == name || self.dynamic_partition.name == name
    }

    pub fn all(&self) -> [&Partition; 2] {
        [&self.static_partition, &self.dynamic_partition]
    }
}

impl CacheDb {
    /// Create the partition if it does not exist yet.
    pub async fn open_partition(&self, partition: &Partition) -> Result<(), Error> {
        let partition = partition.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO partitions (name, role, created_at) VALUES (?1, ?2, ?3)",
                    params![partition.name, partition.role.as_str(), chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    pub async fn has_partition(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM partitions WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Role recorded for a partition, if it exists.
    pub async fn partition_role(&self, name: &str) -> Result<Option<PartitionRole>, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<Option<PartitionRole>, Error> {
                let role: Option<String> = conn
                    .query_row("SELECT role FROM partitions WHERE name = ?1", params![name], |row| row.get(0))
                    .optional()?;
                role.map(|r| {
                    PartitionRole::from_name(&r)
                        .ok_or_else(|| Error::CorruptEntry(format!("unknown partition role {r:?} for {name}")))
                })
                .transpose()
            })
            .await
            .map_err(Error::from)
    }

    /// All partition names, oldest first.
    pub async fn partition_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM partitions ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a partition and every entry in it.
    ///
    /// Returns false if the partition did not exist.
    pub async fn delete_partition(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM partitions WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every partition. Returns how many were removed.
    pub async fn clear_partitions(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let deleted = conn.execute("DELETE FROM partitions", [])?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Copy entries from `from` into `to`, keeping any entry `to` already
    /// holds for the same request. Returns the number of copied entries.
    pub async fn migrate_partition(&self, from: &str, to: &Partition) -> Result<u64, Error> {
        if from == to.name {
            return Ok(0);
        }
        if !self.has_partition(from).await? {
            return Err(Error::PartitionNotFound(from.to_string()));
        }
        self.open_partition(to).await?;

        let from = from.to_string();
        let to = to.name.clone();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let copied = conn.execute(
                    "INSERT OR IGNORE INTO entries
                        (partition, key, url, method, status, status_text, headers_json, body, cached_at)
                     SELECT ?2, key, url, method, status, status_text, headers_json, body, cached_at
                     FROM entries WHERE partition = ?1
                     ORDER BY cached_at ASC",
                    params![from, to],
                )?;
                Ok(copied as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_names() {
        let registry = PartitionRegistry::new("blog", "2.0.0");
        assert_eq!(registry.current(PartitionRole::Static).name, "blog-static-v2.0.0");
        assert_eq!(registry.current(PartitionRole::Dynamic).name, "blog-dynamic-v2.0.0");
        assert!(registry.is_current("blog-static-v2.0.0"));
        assert!(!registry.is_current("blog-static-v1.0.0"));
    }

    #[test]
    fn test_registry_from_default_config() {
        let registry = PartitionRegistry::from_config(&AppConfig::default());
        assert_eq!(registry.all()[0].name, "bambans-static-v1.2.0");
        assert_eq!(registry.all()[1].name, "bambans-dynamic-v1.2.0");
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let registry = PartitionRegistry::new("blog", "1");
        let p = registry.current(PartitionRole::Static);

        db.open_partition(p).await.unwrap();
        db.open_partition(p).await.unwrap();

        assert_eq!(db.partition_names().await.unwrap(), vec![p.name.clone()]);
        assert_eq!(db.partition_role(&p.name).await.unwrap(), Some(PartitionRole::Static));
    }

    #[tokio::test]
    async fn test_delete_missing_partition() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(!db.delete_partition("nope").await.unwrap());
        assert_eq!(db.partition_role("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear_twice() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let registry = PartitionRegistry::new("blog", "1");
        for p in registry.all() {
            db.open_partition(p).await.unwrap();
        }

        assert_eq!(db.clear_partitions().await.unwrap(), 2);
        assert!(db.partition_names().await.unwrap().is_empty());
        assert_eq!(db.clear_partitions().await.unwrap(), 0);
        assert!(db.partition_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_migrate_missing_source() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let registry = PartitionRegistry::new("blog", "2");
        let result = db.migrate_partition("blog-dynamic-v1", registry.current(PartitionRole::Dynamic)).await;
        assert!(matches!(result, Err(Error::PartitionNotFound(_))));
    }
}
