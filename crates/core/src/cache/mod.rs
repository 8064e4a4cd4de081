//! SQLite-backed partition store.
//!
//! Named, versioned partitions of request/response snapshots, accessed
//! asynchronously through tokio-rusqlite. It provides:
//!
//! - Partition lifecycle (open, list, delete, clear, migrate)
//! - Immutable entries stamped with a synthetic cached-at tag
//! - Size-bounded trimming and time-bounded expiry
//! - Automatic schema migrations and WAL mode

pub mod connection;
pub mod entries;
pub mod eviction;
pub mod hash;
pub mod migrations;
pub mod partitions;
pub mod tag;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CachedEntry;
pub use eviction::is_expired;
pub use partitions::{Partition, PartitionRegistry};
