//! Admin message protocol.
//!
//! Callers post `{action, data}` commands over a channel; a single controller
//! task owns the worker side and answers each one on its own reply channel
//! with `{success, data?, error?}`.

use super::Worker;
use postcache_core::Error;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Queue depth of the admin channel.
pub const DEFAULT_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    SkipWaiting,
    ClearCache,
    CacheUrls { urls: Vec<String> },
    GetCacheInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Reply {
    pub fn ok(data: Value) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub fn err(error: impl ToString) -> Self {
        Self { success: false, data: None, error: Some(error.to_string()) }
    }
}

pub struct Envelope {
    pub command: Command,
    pub reply: oneshot::Sender<Reply>,
}

/// Sending side of the admin channel.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<Envelope>,
}

impl WorkerHandle {
    /// Post a command and wait for its reply.
    ///
    /// # Errors
    ///
    /// Returns `Error::WorkerStopped` if the controller task has exited.
    pub async fn post(&self, command: Command) -> Result<Reply, Error> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { command, reply })
            .await
            .map_err(|_| Error::WorkerStopped("admin channel closed".into()))?;
        rx.await.map_err(|_| Error::WorkerStopped("reply dropped".into()))
    }
}

/// Start the controller task for `worker`.
pub fn spawn_controller(worker: Worker, capacity: usize) -> (WorkerHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<Envelope>(capacity);
    let task = tokio::spawn(async move {
        while let Some(Envelope { command, reply }) = rx.recv().await {
            tracing::debug!(?command, "admin command");
            let answer = execute(&worker, command).await;
            if reply.send(answer).is_err() {
                tracing::debug!("admin caller went away before the reply");
            }
        }
        tracing::debug!("admin controller stopped");
    });
    (WorkerHandle { tx }, task)
}

/// Run one command against the worker.
pub async fn execute(worker: &Worker, command: Command) -> Reply {
    let result = match command {
        Command::SkipWaiting => worker.skip_waiting().await.and_then(|activation| {
            Ok(json!({ "state": worker.state(), "activation": serde_json::to_value(activation)? }))
        }),
        Command::ClearCache => worker.clear_all().await.map(|cleared| json!({ "cleared": cleared })),
        Command::CacheUrls { urls } => worker
            .cache_urls(&urls)
            .await
            .and_then(|reports| serde_json::to_value(reports).map_err(Error::from)),
        Command::GetCacheInfo => worker
            .cache_info()
            .await
            .and_then(|info| serde_json::to_value(info).map_err(Error::from)),
    };

    match result {
        Ok(data) => Reply::ok(data),
        Err(err) => {
            tracing::warn!(error = %err, "admin command failed");
            Reply::err(err)
        }
    }
}
