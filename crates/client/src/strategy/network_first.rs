use super::{Dispatcher, Outcome, Source};
use postcache_core::{Partition, Request, Response};

const OFFLINE_MESSAGE: &str = "Unable to fetch data. Please check your connection.";

impl Dispatcher {
    /// Network answers first. A transport failure or a rate-limit status falls
    /// back to the cached entry; with nothing cached a transport failure
    /// becomes a JSON 503 and a rate-limit status is surfaced.
    pub(crate) async fn network_first(&self, request: &Request, partition: &Partition) -> Outcome {
        match self.network(request).await {
            Ok(response) if response.is_ok() => {
                self.write_through(partition, request, &response).await;
                Outcome::new(response, Source::Network)
            }
            Ok(response) if self.config.is_rate_limit_status(response.status) => {
                match self.lookup(partition, request).await {
                    Some(entry) => {
                        tracing::info!(url = %request.url, status = response.status, "rate limited, serving cached entry");
                        Outcome::from_cache(entry, Source::Fallback)
                    }
                    None => Outcome::new(response, Source::Network),
                }
            }
            Ok(response) => Outcome::new(response, Source::Network),
            Err(err) => match self.lookup(partition, request).await {
                Some(entry) => {
                    tracing::info!(url = %request.url, error = %err, "network failed, serving cached entry");
                    Outcome::from_cache(entry, Source::Fallback)
                }
                None => {
                    tracing::warn!(url = %request.url, error = %err, "network failed with nothing cached");
                    Outcome::new(Response::offline_json(OFFLINE_MESSAGE, self.clock.now()), Source::Offline)
                }
            },
        }
    }
}
