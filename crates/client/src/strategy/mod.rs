//! Strategy dispatch.
//!
//! ### Mapping
//! | class               | strategy               | partition |
//! |---------------------|------------------------|-----------|
//! | static-asset        | cache-first            | static    |
//! | third-party-asset   | cache-first            | dynamic   |
//! | upstream-api        | network-first          | dynamic   |
//! | other               | stale-while-revalidate | dynamic   |
//!
//! ### Failure semantics
//! - A fetch that times out is a network error.
//! - [`Dispatcher::handle`] never fails: anything unrecoverable becomes a
//!   synthetic offline response.
//! - Cache write failures are logged and swallowed.
//! - Non-2xx responses are returned as-is and never stored.

mod cache_first;
mod network_first;
mod stale_while_revalidate;

use crate::classify::{Classification, Classifier};
use crate::fetch::{FetchError, Fetcher, fetch_with_timeout};
use postcache_core::{
    AppConfig, CacheDb, CachedEntry, Clock, ConfigError, Partition, PartitionRegistry, Request, Response,
};
use serde::Serialize;
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
}

impl Strategy {
    pub fn for_class(class: Classification) -> Self {
        match class {
            Classification::StaticAsset | Classification::ThirdPartyAsset => Strategy::CacheFirst,
            Classification::UpstreamApi => Strategy::NetworkFirst,
            Classification::Other => Strategy::StaleWhileRevalidate,
        }
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    /// A cached entry served as the primary answer.
    Cache,
    /// The network answered.
    Network,
    /// A cached entry served because the network failed or was rate-limited.
    Fallback,
    /// Neither network nor cache; a synthetic offline response.
    Offline,
}

/// A served response and how it was obtained.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub response: Response,
    pub source: Source,
    pub class: Option<Classification>,
}

impl Outcome {
    fn new(response: Response, source: Source) -> Self {
        Self { response, source, class: None }
    }

    fn from_cache(entry: CachedEntry, source: Source) -> Self {
        Self::new(entry.response, source)
    }
}

/// Routes each request to its strategy and owns every collaborator the
/// strategies need. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    config: Arc<AppConfig>,
    db: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    partitions: PartitionRegistry,
    classifier: Arc<Classifier>,
    origin: Url,
}

impl Dispatcher {
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the site origin does not parse.
    pub fn new(
        config: Arc<AppConfig>, db: CacheDb, fetcher: Arc<dyn Fetcher>, clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let classifier = Classifier::from_config(&config)?;
        let origin = config.site_origin_url()?;
        let partitions = PartitionRegistry::from_config(&config);
        Ok(Self { config, db, fetcher, clock, partitions, classifier: Arc::new(classifier), origin })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn partitions(&self) -> &PartitionRegistry {
        &self.partitions
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Serve one request through the cache layer.
    pub async fn handle(&self, request: &Request) -> Outcome {
        let Some(class) = self.classifier.classify(request) else {
            return self.passthrough(request).await;
        };

        let strategy = Strategy::for_class(class);
        let partition = self.partitions.current(class.partition_role()).clone();
        tracing::debug!(url = %request.url, class = class.as_str(), ?strategy, partition = %partition.name, "dispatch");

        let mut outcome = match strategy {
            Strategy::CacheFirst => self.cache_first(request, &partition).await,
            Strategy::NetworkFirst => self.network_first(request, &partition).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request, &partition).await,
        };
        outcome.class = Some(class);
        outcome
    }

    /// Send a request straight to the network, bypassing every partition.
    pub async fn passthrough(&self, request: &Request) -> Outcome {
        match self.network(request).await {
            Ok(response) => Outcome::new(response, Source::Network),
            Err(err) => {
                tracing::debug!(url = %request.url, error = %err, "passthrough failed");
                Outcome::new(self.offline_fallback(request).await, Source::Offline)
            }
        }
    }

    /// Fetch with the configured abort-after-timeout.
    pub(crate) async fn network(&self, request: &Request) -> Result<Response, FetchError> {
        fetch_with_timeout(self.fetcher.as_ref(), request, self.config.timeout()).await
    }

    /// Read errors are treated as a miss.
    pub(crate) async fn lookup(&self, partition: &Partition, request: &Request) -> Option<CachedEntry> {
        match self.db.match_entry(&partition.name, request).await {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(url = %request.url, partition = %partition.name, error = %err, "cache read failed");
                None
            }
        }
    }

    pub(crate) fn is_fresh(&self, entry: &CachedEntry) -> bool {
        !entry.is_expired(self.config.max_age(), self.clock.now())
    }

    /// Store a successful response and apply the size bound.
    pub(crate) async fn write_through(&self, partition: &Partition, request: &Request, response: &Response) {
        if let Err(err) = self.store(partition, request, response).await {
            tracing::warn!(url = %request.url, partition = %partition.name, error = %err, "cache write failed");
        }
    }

    /// Store and trim, propagating storage errors.
    pub(crate) async fn store(
        &self, partition: &Partition, request: &Request, response: &Response,
    ) -> Result<(), postcache_core::Error> {
        self.db.put_entry(partition, request, response, self.clock.now()).await?;
        let max = self.config.max_entries(partition.role);
        let evicted = self.db.trim_partition(&partition.name, max).await?;
        if evicted > 0 {
            tracing::debug!(partition = %partition.name, evicted, max, "trimmed partition");
        }
        Ok(())
    }

    /// Last-resort response when neither network nor cache can answer.
    pub(crate) async fn offline_fallback(&self, request: &Request) -> Response {
        if !request.is_navigation() {
            return Response::offline_text();
        }

        let cached_page = match self.offline_page_request() {
            Some(page) => self.lookup(self.partitions.current(postcache_core::PartitionRole::Static), &page).await,
            None => None,
        };
        match cached_page {
            Some(entry) => entry.response,
            None => Response::offline_page(),
        }
    }

    fn offline_page_request(&self) -> Option<Request> {
        crate::fetch::resolve(&self.config.offline_page, &self.origin).ok().map(Request::get)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::fetch::scripted::Script;
    use url::Url;

    #[test]
    fn test_strategy_mapping() {
        assert_eq!(Strategy::for_class(Classification::StaticAsset), Strategy::CacheFirst);
        assert_eq!(Strategy::for_class(Classification::ThirdPartyAsset), Strategy::CacheFirst);
        assert_eq!(Strategy::for_class(Classification::UpstreamApi), Strategy::NetworkFirst);
        assert_eq!(Strategy::for_class(Classification::Other), Strategy::StaleWhileRevalidate);
    }

    #[tokio::test]
    async fn test_bypass_goes_to_network_and_is_not_stored() {
        let h = harness().await;
        h.fetcher.respond("https://bambans.github.io/", "home");
        let post = Request::new("POST", Url::parse("https://bambans.github.io/").unwrap());

        let outcome = h.dispatcher.handle(&post).await;
        assert_eq!(outcome.source, Source::Network);
        assert_eq!(outcome.class, None);

        let static_name = &h.dispatcher.partitions().current(postcache_core::PartitionRole::Static).name;
        assert_eq!(h.dispatcher.db().entry_count(static_name).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_navigation_uses_cached_offline_page() {
        let h = harness().await;
        h.fetcher.respond("https://bambans.github.io/blog/offline.html", "<h1>cached offline</h1>");
        h.dispatcher.handle(&get("https://bambans.github.io/blog/offline.html")).await;

        let nav = Request::navigate(Url::parse("https://bambans.github.io/blog/posts/new").unwrap());
        let outcome = h.dispatcher.handle(&nav).await;
        assert_eq!(outcome.source, Source::Offline);
        assert_eq!(outcome.response.text(), "<h1>cached offline</h1>");
    }

    #[tokio::test]
    async fn test_failed_navigation_without_cached_page_gets_builtin_page() {
        let h = harness().await;
        let nav = Request::navigate(Url::parse("https://bambans.github.io/blog/posts/new").unwrap());
        let outcome = h.dispatcher.handle(&nav).await;
        assert_eq!(outcome.response.status, 503);
        assert!(outcome.response.content_type().unwrap().starts_with("text/html"));
    }

    #[tokio::test]
    async fn test_write_trims_to_bound() {
        let h = harness_with(AppConfig { max_entries_dynamic: 2, timeout_ms: 200, ..Default::default() }).await;
        for i in 0..4 {
            let url = format!("https://cdn.jsdelivr.net/npm/lib{i}.js");
            h.fetcher.script(&url, Script::Respond(Response::new(200, "x")));
            h.dispatcher.handle(&get(&url)).await;
            h.clock.advance(chrono::Duration::seconds(1));
        }

        let dynamic = &h.dispatcher.partitions().current(postcache_core::PartitionRole::Dynamic).name;
        assert_eq!(h.dispatcher.db().entry_count(dynamic).await.unwrap(), 2);
        assert_eq!(
            h.dispatcher.db().entry_urls(dynamic, 10).await.unwrap(),
            vec!["https://cdn.jsdelivr.net/npm/lib2.js", "https://cdn.jsdelivr.net/npm/lib3.js"]
        );
    }
}
