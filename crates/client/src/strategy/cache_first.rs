use super::{Dispatcher, Outcome, Source};
use postcache_core::{Partition, Request};

impl Dispatcher {
    /// Fresh hit: serve without touching the network. Miss or expired: fetch
    /// and write through. Network failure: serve whatever is cached, even
    /// expired.
    pub(crate) async fn cache_first(&self, request: &Request, partition: &Partition) -> Outcome {
        let cached = self.lookup(partition, request).await;
        if let Some(entry) = cached.as_ref().filter(|e| self.is_fresh(e)) {
            tracing::debug!(url = %request.url, partition = %partition.name, "cache hit");
            return Outcome::new(entry.response.clone(), Source::Cache);
        }

        match self.network(request).await {
            Ok(response) => {
                if response.is_ok() {
                    self.write_through(partition, request, &response).await;
                }
                Outcome::new(response, Source::Network)
            }
            Err(err) => match cached {
                Some(entry) => {
                    tracing::info!(url = %request.url, error = %err, "network failed, serving stale entry");
                    Outcome::from_cache(entry, Source::Fallback)
                }
                None => {
                    tracing::warn!(url = %request.url, error = %err, "network failed with nothing cached");
                    Outcome::new(self.offline_fallback(request).await, Source::Offline)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::fetch::scripted::Script;
    use chrono::Duration;
    use postcache_core::Response;

    const STYLE: &str = "https://bambans.github.io/css/style.css";

    #[tokio::test]
    async fn test_second_static_request_skips_network() {
        let h = harness().await;
        h.fetcher.respond(STYLE, "body{}");

        let first = h.dispatcher.handle(&get(STYLE)).await;
        assert_eq!(first.source, Source::Network);
        let second = h.dispatcher.handle(&get(STYLE)).await;
        assert_eq!(second.source, Source::Cache);
        assert_eq!(second.response.text(), "body{}");

        assert_eq!(h.fetcher.calls(STYLE), 1);
    }

    #[tokio::test]
    async fn test_non_ok_is_returned_and_not_cached() {
        let h = harness().await;
        h.fetcher.script(STYLE, Script::Respond(Response::new(404, "missing")));

        let first = h.dispatcher.handle(&get(STYLE)).await;
        assert_eq!(first.response.status, 404);
        h.dispatcher.handle(&get(STYLE)).await;
        assert_eq!(h.fetcher.calls(STYLE), 2);
    }

    #[tokio::test]
    async fn test_expiry_round_trip() {
        let h = harness().await;
        let max_age = h.dispatcher.config().max_age();
        h.fetcher.respond(STYLE, "v1");
        h.dispatcher.handle(&get(STYLE)).await;

        // served from cache just before T+M
        h.clock.advance(max_age - Duration::milliseconds(1));
        let before = h.dispatcher.handle(&get(STYLE)).await;
        assert_eq!(before.source, Source::Cache);
        assert_eq!(h.fetcher.calls(STYLE), 1);

        // at T+M it is a miss and the network refreshes it
        h.clock.advance(Duration::milliseconds(1));
        h.fetcher.respond(STYLE, "v2");
        let at = h.dispatcher.handle(&get(STYLE)).await;
        assert_eq!(at.source, Source::Network);
        assert_eq!(at.response.text(), "v2");
        assert_eq!(h.fetcher.calls(STYLE), 2);

        // expired again and offline: the stale entry is still served
        h.clock.advance(max_age * 3);
        h.fetcher.set_offline(true);
        let offline = h.dispatcher.handle(&get(STYLE)).await;
        assert_eq!(offline.source, Source::Fallback);
        assert_eq!(offline.response.status, 200);
        assert_eq!(offline.response.text(), "v2");
    }

    #[tokio::test]
    async fn test_miss_and_offline_is_synthetic() {
        let h = harness().await;
        let outcome = h.dispatcher.handle(&get(STYLE)).await;
        assert_eq!(outcome.source, Source::Offline);
        assert_eq!(outcome.response.status, 503);
        assert_eq!(outcome.response.content_type(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_timeout_falls_back_to_stale() {
        let h = harness().await;
        let url = "https://cdn.jsdelivr.net/npm/marked/marked.min.js";
        h.fetcher.respond(url, "marked");
        h.dispatcher.handle(&get(url)).await;

        h.clock.advance(h.dispatcher.config().max_age());
        h.fetcher.script(url, Script::Slow(std::time::Duration::from_secs(5), Response::new(200, "late")));
        let outcome = h.dispatcher.handle(&get(url)).await;
        assert_eq!(outcome.source, Source::Fallback);
        assert_eq!(outcome.response.text(), "marked");
    }
}
