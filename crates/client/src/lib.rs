//! Client side of postcache.
//!
//! This crate provides the network fetcher, the request classifier, the
//! caching strategies, the worker lifecycle with its admin channel, and the
//! upstream content client built on top of them.

pub mod classify;
pub mod fetch;
pub mod strategy;
pub mod upstream;
pub mod worker;

pub use classify::{Classification, Classifier};
pub use fetch::{FetchConfig, FetchError, Fetcher, HttpFetcher};
pub use strategy::{Dispatcher, Outcome, Source, Strategy};
pub use upstream::{ContentClient, Post, PostSummary, UpstreamError};
pub use worker::lifecycle::LifecycleState;
pub use worker::messages::{Command, Reply, WorkerHandle, spawn_controller};
pub use worker::{CacheInfo, Worker};
