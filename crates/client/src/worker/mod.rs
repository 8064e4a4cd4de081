//! The cache worker: lifecycle, request entry point and admin operations.
//!
//! ### Lifecycle
//! - **install**: pre-warm the static partition from the declared static
//!   paths and the dynamic partition from the declared third-party URLs.
//!   Every failure is logged and skipped; install itself only fails on
//!   storage errors. Readiness to skip waiting is signalled at the end.
//! - **activate**: delete every partition that is not current (optionally
//!   carrying dynamic entries over first), sweep expired entries, claim
//!   clients.
//! - Until active, and once superseded, requests pass straight to the network.
//!
//! ### Admin
//! - [`messages`] exposes the operations below over a command channel.

pub mod lifecycle;
pub mod messages;
pub mod precache;

use crate::fetch::{Fetcher, resolve};
use crate::strategy::{Dispatcher, Outcome};
use lifecycle::{Lifecycle, LifecycleState};
use postcache_core::{AppConfig, CacheDb, Clock, ConfigError, Error, PartitionRole, Request};
use precache::{PrecacheFailure, PrecacheReport, precache_all};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

/// URLs listed per partition in [`CacheInfo`].
const INFO_SAMPLE: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub static_assets: PrecacheReport,
    pub third_party: PrecacheReport,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivateReport {
    /// Stale partitions removed.
    pub deleted: Vec<String>,
    /// Entries carried over into the current dynamic partition.
    pub migrated: u64,
    /// Expired entries swept.
    pub expired: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartReport {
    pub install: InstallReport,
    pub activate: ActivateReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionInfo {
    pub count: u64,
    pub urls: Vec<String>,
}

/// Per-partition entry counts with a sample of stored URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CacheInfo {
    pub partitions: BTreeMap<String, PartitionInfo>,
}

/// Cheap to clone; clones share lifecycle state.
#[derive(Clone)]
pub struct Worker {
    dispatcher: Dispatcher,
    lifecycle: Arc<Mutex<Lifecycle>>,
}

impl Worker {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher, lifecycle: Arc::new(Mutex::new(Lifecycle::default())) }
    }

    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the site origin does not parse.
    pub fn from_parts(
        config: Arc<AppConfig>, db: CacheDb, fetcher: Arc<dyn Fetcher>, clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(Dispatcher::new(config, db, fetcher, clock)?))
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &AppConfig {
        self.dispatcher.config()
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle().state
    }

    pub fn snapshot(&self) -> Lifecycle {
        self.lifecycle().clone()
    }

    fn transition(&self, next: LifecycleState) -> Result<(), Error> {
        let now = self.dispatcher.clock().now();
        self.lifecycle().transition(next, now)
    }

    /// Entry point for every request the page issues.
    pub async fn handle_fetch(&self, request: &Request) -> Outcome {
        if self.state() == LifecycleState::Active {
            self.dispatcher.handle(request).await
        } else {
            self.dispatcher.passthrough(request).await
        }
    }

    /// Pre-warm both current partitions and move to `Waiting`.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.lifecycle().require(LifecycleState::Installing)?;

        let registry = self.dispatcher.partitions();
        let db = self.dispatcher.db();
        for partition in registry.all() {
            db.open_partition(partition).await?;
        }

        let config = self.config();
        let static_assets =
            self.precache_into(PartitionRole::Static, &config.static_assets).await;
        let third_party =
            self.precache_into(PartitionRole::Dynamic, &config.third_party_assets).await;

        self.transition(LifecycleState::Waiting)?;
        self.lifecycle().skip_waiting = true;

        Ok(InstallReport { static_assets, third_party })
    }

    /// Delete stale partitions, sweep, and take control of clients.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        self.lifecycle().require(LifecycleState::Waiting)?;

        let registry = self.dispatcher.partitions();
        let db = self.dispatcher.db();
        let mut report = ActivateReport::default();

        for name in db.partition_names().await? {
            if registry.is_current(&name) {
                continue;
            }
            if self.config().migrate_dynamic_on_activate
                && db.partition_role(&name).await? == Some(PartitionRole::Dynamic)
            {
                report.migrated += db.migrate_partition(&name, registry.current(PartitionRole::Dynamic)).await?;
            }
            if db.delete_partition(&name).await? {
                tracing::info!(partition = %name, "deleted stale partition");
                report.deleted.push(name);
            }
        }

        for partition in registry.all() {
            db.open_partition(partition).await?;
        }
        if report.migrated > 0 {
            let dynamic = registry.current(PartitionRole::Dynamic);
            let trimmed = db.trim_partition(&dynamic.name, self.config().max_entries(PartitionRole::Dynamic)).await?;
            if trimmed > 0 {
                tracing::info!(partition = %dynamic.name, trimmed, "trimmed migrated entries");
            }
        }
        report.expired = self.sweep_expired().await?;

        self.transition(LifecycleState::Active)?;
        Ok(report)
    }

    /// Install, then activate immediately.
    pub async fn start(&self) -> Result<StartReport, Error> {
        let install = self.install().await?;
        let activate = match self.skip_waiting().await? {
            Some(report) => report,
            None => self.activate().await?,
        };
        Ok(StartReport { install, activate })
    }

    /// Ask to skip the waiting phase. Activates right away if installed.
    pub async fn skip_waiting(&self) -> Result<Option<ActivateReport>, Error> {
        let state = {
            let mut lifecycle = self.lifecycle();
            lifecycle.skip_waiting = true;
            lifecycle.state
        };
        match state {
            LifecycleState::Waiting => self.activate().await.map(Some),
            _ => Ok(None),
        }
    }

    /// A newer worker took over. Requests now bypass the cache.
    pub fn supersede(&self) -> Result<(), Error> {
        self.transition(LifecycleState::Superseded)
    }

    /// Delete every partition. Returns how many existed.
    pub async fn clear_all(&self) -> Result<u64, Error> {
        let cleared = self.dispatcher.db().clear_partitions().await?;
        tracing::info!(cleared, "cleared all partitions");
        Ok(cleared)
    }

    /// Fetch and store each URL in the partition its classification maps to.
    pub async fn cache_urls(&self, urls: &[String]) -> Result<Vec<PrecacheReport>, Error> {
        if urls.is_empty() {
            return Err(Error::InvalidInput("urls cannot be empty".into()));
        }

        let mut by_role: BTreeMap<&'static str, (PartitionRole, Vec<String>)> = BTreeMap::new();
        let mut rejected = Vec::new();
        for raw in urls {
            let classified = resolve(raw, self.dispatcher.origin())
                .map_err(Error::from)
                .map(Request::get)
                .and_then(|req| {
                    self.dispatcher
                        .classifier()
                        .classify(&req)
                        .ok_or_else(|| Error::InvalidInput(format!("{raw} is not cacheable")))
                });
            match classified {
                Ok(class) => {
                    let role = class.partition_role();
                    by_role.entry(role.as_str()).or_insert_with(|| (role, Vec::new())).1.push(raw.clone());
                }
                Err(err) => rejected.push(PrecacheFailure { url: raw.clone(), error: err.to_string() }),
            }
        }

        let mut reports = Vec::new();
        for (_, (role, urls)) in by_role {
            reports.push(self.precache_into(role, &urls).await);
        }
        if !rejected.is_empty() {
            reports.push(PrecacheReport { partition: String::new(), cached: Vec::new(), failed: rejected });
        }
        Ok(reports)
    }

    /// Entry counts and the first stored URLs of every partition.
    pub async fn cache_info(&self) -> Result<CacheInfo, Error> {
        let db = self.dispatcher.db();
        let mut info = CacheInfo::default();
        for name in db.partition_names().await? {
            let count = db.entry_count(&name).await?;
            let urls = db.entry_urls(&name, INFO_SAMPLE).await?;
            info.partitions.insert(name, PartitionInfo { count, urls });
        }
        Ok(info)
    }

    /// Delete expired entries from the current partitions.
    pub async fn sweep_expired(&self) -> Result<u64, Error> {
        let db = self.dispatcher.db();
        let max_age = self.config().max_age();
        let now = self.dispatcher.clock().now();

        let mut expired = 0;
        for partition in self.dispatcher.partitions().all() {
            expired += db.purge_expired(&partition.name, max_age, now).await?;
        }
        if expired > 0 {
            tracing::info!(expired, "swept expired entries");
        }
        Ok(expired)
    }

    /// Refresh the posts listing once connectivity is back.
    ///
    /// Returns whether the stored listing was replaced.
    pub async fn background_sync(&self) -> Result<bool, Error> {
        let request = Request::parse_get(&self.config().upstream.posts_list_url())?;
        let partition = self.dispatcher.partitions().current(PartitionRole::Dynamic);

        let response = self.dispatcher.network(&request).await?;
        if !response.is_ok() {
            tracing::info!(url = %request.url, status = response.status, "background sync got no fresh listing");
            return Ok(false);
        }
        self.dispatcher.store(partition, &request, &response).await?;
        tracing::info!(url = %request.url, "background sync refreshed posts listing");
        Ok(true)
    }

    /// Run [`Worker::sweep_expired`] on the configured interval while active.
    ///
    /// Returns `None` when no interval is configured.
    pub fn spawn_sweeper(&self) -> Option<JoinHandle<()>> {
        let period = self.config().sweep_interval()?;
        let worker = self.clone();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match worker.state() {
                    LifecycleState::Superseded => break,
                    LifecycleState::Active => {
                        if let Err(err) = worker.sweep_expired().await {
                            tracing::warn!(error = %err, "expiration sweep failed");
                        }
                    }
                    _ => {}
                }
            }
        }))
    }

    async fn precache_into(&self, role: PartitionRole, inputs: &[String]) -> PrecacheReport {
        let partition = self.dispatcher.partitions().current(role);
        let mut requests = Vec::with_capacity(inputs.len());
        let mut unresolved = Vec::new();
        for raw in inputs {
            match resolve(raw, self.dispatcher.origin()) {
                Ok(url) => requests.push(Request::get(url)),
                Err(err) => unresolved.push(PrecacheFailure { url: raw.clone(), error: err.to_string() }),
            }
        }

        let mut report = precache_all(&self.dispatcher, partition, requests).await;
        report.failed.extend(unresolved);
        report
    }
}
