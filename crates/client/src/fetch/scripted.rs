//! Scripted network double for tests.
//!
//! Each URL is bound to a [`Script`]; unscripted URLs fail like an unreachable
//! host. Calls are counted per URL so tests can assert that a cache hit never
//! touched the network.

use super::{FetchError, Fetcher};
use async_trait::async_trait;
use postcache_core::{Request, Response};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// What the network does for one URL.
#[derive(Debug, Clone)]
pub enum Script {
    Respond(Response),
    Fail,
    Slow(Duration, Response),
}

#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    routes: Mutex<HashMap<String, Script>>,
    calls: Mutex<HashMap<String, usize>>,
    offline: AtomicBool,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind (or rebind) `url` to `script`.
    pub fn script(&self, url: &str, script: Script) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.insert(url.to_string(), script);
        }
    }

    /// Shorthand for a 200 with `body`.
    pub fn respond(&self, url: &str, body: &str) {
        self.script(url, Script::Respond(Response::new(200, body)));
    }

    /// Make every fetch fail until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of fetches issued for `url`.
    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().map(|c| c.get(url).copied().unwrap_or(0)).unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().map(|c| c.values().sum()).unwrap_or(0)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let url = request.url.to_string();
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(url.clone()).or_default() += 1;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Network(format!("offline: {url}")));
        }

        let script = self.routes.lock().ok().and_then(|r| r.get(&url).cloned());
        match script {
            Some(Script::Respond(response)) => Ok(response),
            Some(Script::Slow(delay, response)) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            Some(Script::Fail) | None => Err(FetchError::Network(format!("unreachable: {url}"))),
        }
    }
}
