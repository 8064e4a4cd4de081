use super::{Dispatcher, Outcome, Source};
use postcache_core::{Partition, Request};

impl Dispatcher {
    /// Serve the cached entry at once and refresh it in a detached task. With
    /// nothing cached, wait on the network instead.
    pub(crate) async fn stale_while_revalidate(&self, request: &Request, partition: &Partition) -> Outcome {
        if let Some(entry) = self.lookup(partition, request).await {
            self.spawn_refresh(request.clone(), partition.clone());
            return Outcome::from_cache(entry, Source::Cache);
        }

        match self.network(request).await {
            Ok(response) => {
                if response.is_ok() {
                    self.write_through(partition, request, &response).await;
                }
                Outcome::new(response, Source::Network)
            }
            Err(err) => {
                tracing::warn!(url = %request.url, error = %err, "network failed with nothing cached");
                Outcome::new(self.offline_fallback(request).await, Source::Offline)
            }
        }
    }

    fn spawn_refresh(&self, request: Request, partition: Partition) {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            match dispatcher.network(&request).await {
                Ok(response) if response.is_ok() => {
                    dispatcher.write_through(&partition, &request, &response).await;
                    tracing::debug!(url = %request.url, "revalidated");
                }
                Ok(response) => {
                    tracing::debug!(url = %request.url, status = response.status, "revalidation skipped");
                }
                Err(err) => {
                    tracing::debug!(url = %request.url, error = %err, "revalidation failed");
                }
            }
        });
    }
}
