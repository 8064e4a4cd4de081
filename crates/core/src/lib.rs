//! Core types and shared functionality for postcache.
//!
//! This crate provides:
//! - Request and response snapshots, including the synthetic offline responses
//! - The partition store with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod request;
pub mod response;

pub use cache::{CacheDb, CachedEntry, Partition, PartitionRegistry};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, ConfigError, PartitionRole, UpstreamConfig};
pub use error::Error;
pub use request::{Request, RequestMode};
pub use response::Response;
