//! Cache probe and original-asset fetches.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tracing::debug;
use vitrine_config::Config;
use vitrine_model::{CanonicalAddress, ContentFingerprint};

use crate::inflight::InflightRequests;
use crate::transport::{FetchOutcome, ImageTransport, TransportError};

/// Issues the two image `GET`s of the pipeline.
///
/// Identical URLs in flight are joined rather than re-sent, and the number
/// of requests on the wire is capped process-wide.
#[derive(Debug, Clone)]
pub struct CacheFetcher {
    transport: Arc<dyn ImageTransport>,
    config: Arc<Config>,
    inflight: InflightRequests,
    permits: Arc<Semaphore>,
}

impl CacheFetcher {
    pub fn new(
        transport: Arc<dyn ImageTransport>,
        config: Arc<Config>,
    ) -> Self {
        let limit = config
            .http
            .max_concurrent_fetches
            .clamp(1, Semaphore::MAX_PERMITS);
        let permits = Arc::new(Semaphore::new(limit));
        Self {
            transport,
            config,
            inflight: InflightRequests::new(),
            permits,
        }
    }

    pub fn probe_url(&self, fingerprint: ContentFingerprint) -> String {
        self.config.cache_read_url(fingerprint)
    }

    /// `GET {cacheBase}/{fingerprint}`.
    pub async fn probe(&self, fingerprint: ContentFingerprint) -> FetchOutcome {
        self.get_deduplicated(self.probe_url(fingerprint)).await
    }

    /// `GET {canonicalAddress}`. An empty address is never requested.
    pub async fn fetch_original(
        &self,
        address: &CanonicalAddress,
    ) -> FetchOutcome {
        if address.is_empty() {
            return FetchOutcome::NotFound;
        }
        self.get_deduplicated(address.as_str().to_string()).await
    }

    /// Requests currently on the wire or waiting for a permit.
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    async fn get_deduplicated(&self, url: String) -> FetchOutcome {
        let transport = Arc::clone(&self.transport);
        let permits = Arc::clone(&self.permits);
        let request_url = url.clone();
        let (request, started) = self.inflight.join_or_start(&url, move || {
            async move {
                // Joined callers share this permit.
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return FetchOutcome::Transport(TransportError::Request {
                            url: request_url,
                            message: "fetch limiter closed".into(),
                        });
                    }
                };
                transport.get(&request_url).await
            }
            .boxed()
        });
        if !started {
            debug!(%url, "joined in-flight request");
        }
        request.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct Offline;

    #[async_trait]
    impl ImageTransport for Offline {
        async fn get(&self, _url: &str) -> FetchOutcome {
            FetchOutcome::NotFound
        }

        async fn post(&self, _url: &str) -> FetchOutcome {
            FetchOutcome::NotFound
        }
    }

    #[tokio::test]
    async fn oversized_limit_is_clamped_instead_of_panicking() {
        let mut config = Config::default();
        config.http.max_concurrent_fetches = usize::MAX;
        let fetcher = CacheFetcher::new(Arc::new(Offline), Arc::new(config));

        assert_eq!(
            fetcher.permits.available_permits(),
            Semaphore::MAX_PERMITS
        );
        let outcome = fetcher.probe(ContentFingerprint::from_raw(5381)).await;
        assert_eq!(outcome, FetchOutcome::NotFound);
    }

    #[tokio::test]
    async fn zero_limit_still_admits_one_fetch() {
        let mut config = Config::default();
        config.http.max_concurrent_fetches = 0;
        let fetcher = CacheFetcher::new(Arc::new(Offline), Arc::new(config));

        let outcome = fetcher.probe(ContentFingerprint::from_raw(5381)).await;
        assert_eq!(outcome, FetchOutcome::NotFound);
    }
}
