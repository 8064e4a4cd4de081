//! Bounded-concurrency pre-warming of a partition.

use crate::strategy::Dispatcher;
use postcache_core::{Error, Partition, Request};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Parallel fetches per batch.
const MAX_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrecacheFailure {
    pub url: String,
    pub error: String,
}

/// Result of one pre-warm batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrecacheReport {
    pub partition: String,
    /// URLs stored, in input order.
    pub cached: Vec<String>,
    pub failed: Vec<PrecacheFailure>,
}

impl PrecacheReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Fetch one request and store it. Unlike the strategies this reports
/// failures instead of hiding them, so callers can log what was skipped.
pub(crate) async fn precache_one(dispatcher: &Dispatcher, partition: &Partition, request: &Request) -> Result<(), Error> {
    let response = dispatcher.network(request).await?;
    if !response.is_ok() {
        return Err(Error::HttpError(format!("{} {}", response.status, response.status_text)));
    }
    dispatcher.store(partition, request, &response).await
}

/// Fetch and store every request into `partition`. Individual failures are
/// recorded, never propagated.
pub(crate) async fn precache_all(dispatcher: &Dispatcher, partition: &Partition, requests: Vec<Request>) -> PrecacheReport {
    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENCY));
    let mut join_set = JoinSet::new();

    for (index, request) in requests.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let dispatcher = dispatcher.clone();
        let partition = partition.clone();
        join_set.spawn(async move {
            // held for the task's lifetime
            let _permit = semaphore.acquire_owned().await;
            let result = precache_one(&dispatcher, &partition, &request).await;
            (index, request.url.to_string(), result)
        });
    }

    let mut outcomes = Vec::new();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => tracing::warn!(error = %err, "precache task panicked"),
        }
    }
    outcomes.sort_by_key(|(index, _, _)| *index);

    let mut report = PrecacheReport { partition: partition.name.clone(), ..Default::default() };
    for (_, url, result) in outcomes {
        match result {
            Ok(()) => report.cached.push(url),
            Err(err) => {
                tracing::warn!(url = %url, partition = %partition.name, error = %err, "precache failed");
                report.failed.push(PrecacheFailure { url, error: err.to_string() });
            }
        }
    }

    tracing::info!(
        partition = %partition.name,
        cached = report.cached.len(),
        failed = report.failed.len(),
        "precache finished"
    );
    report
}
