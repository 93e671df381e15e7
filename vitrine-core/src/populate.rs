//! Asking the backend to store a rendition of an original asset.

use std::sync::Arc;

use dashmap::DashSet;
use tokio::task::JoinHandle;
use tracing::debug;
use vitrine_config::Config;
use vitrine_model::ImageReference;

use crate::error::ResolveError;
use crate::transport::{FetchOutcome, ImageTransport};

/// Fire-and-forget cache warming.
///
/// At most one populate per reference is on the wire at any time across the
/// process; the service side is idempotent, so a later duplicate is harmless
/// but still avoided while the first is pending.
#[derive(Debug, Clone)]
pub struct CachePopulator {
    transport: Arc<dyn ImageTransport>,
    config: Arc<Config>,
    pending: Arc<DashSet<String>>,
}

impl CachePopulator {
    pub fn new(
        transport: Arc<dyn ImageTransport>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            transport,
            config,
            pending: Arc::new(DashSet::new()),
        }
    }

    /// `{apiBase}/cache/{urlEncode(reference)}`, encoding the reference as
    /// written by the token metadata, not its canonical form.
    pub fn populate_url(&self, reference: &ImageReference) -> String {
        let encoded = urlencoding::encode(reference.as_str());
        self.config.cache_populate_url(&encoded)
    }

    /// Spawn the populate request.
    ///
    /// Returns `None` when nothing was sent: the reference is empty or a
    /// populate for it is already pending. Failures are logged and dropped.
    pub fn populate(
        &self,
        reference: &ImageReference,
    ) -> Option<JoinHandle<()>> {
        if reference.is_empty() {
            return None;
        }
        let key = reference.as_str().to_string();
        if !self.pending.insert(key.clone()) {
            debug!(reference = %key, "populate already pending");
            return None;
        }

        let url = self.populate_url(reference);
        let transport = Arc::clone(&self.transport);
        let pending = Arc::clone(&self.pending);
        Some(tokio::spawn(async move {
            match transport.post(&url).await {
                FetchOutcome::Success(_) => {
                    debug!(%url, "cache populate accepted");
                }
                FetchOutcome::NotFound => {
                    debug!(%url, "cache populate endpoint not found");
                }
                FetchOutcome::Transport(cause) => {
                    let err = ResolveError::Populate {
                        reference: key.clone(),
                        cause,
                    };
                    debug!(error = ?err, "cache populate failed");
                }
            }
            pending.remove(&key);
        }))
    }

    /// Populates currently pending.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::sync::Notify;

    #[derive(Debug, Default)]
    struct GatedPost {
        release: Notify,
        posts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ImageTransport for GatedPost {
        async fn get(&self, _url: &str) -> FetchOutcome {
            FetchOutcome::NotFound
        }

        async fn post(&self, url: &str) -> FetchOutcome {
            self.posts.lock().push(url.to_string());
            self.release.notified().await;
            FetchOutcome::Transport(crate::transport::TransportError::Status {
                url: url.to_string(),
                status: 500,
            })
        }
    }

    fn populator(transport: Arc<GatedPost>) -> CachePopulator {
        CachePopulator::new(transport, Arc::new(Config::default()))
    }

    #[test]
    fn url_encodes_the_raw_reference() {
        let populator = populator(Arc::new(GatedPost::default()));
        let reference = ImageReference::new("ipfs://abc123/img.png");
        let url = populator.populate_url(&reference);
        assert_eq!(
            url,
            "https://api.fantom.digital/cache/ipfs%3A%2F%2Fabc123%2Fimg.png"
        );
    }

    #[tokio::test]
    async fn duplicate_populate_is_suppressed_while_pending() {
        let transport = Arc::new(GatedPost::default());
        let populator = populator(Arc::clone(&transport));
        let reference = ImageReference::new("ipfs://abc123/img.png");

        let first = populator.populate(&reference).unwrap();
        assert!(populator.populate(&reference).is_none());
        assert_eq!(populator.pending(), 1);

        // Let the spawned task reach the gate before releasing it.
        while transport.posts.lock().is_empty() {
            tokio::task::yield_now().await;
        }
        transport.release.notify_one();
        first.await.unwrap();

        assert_eq!(populator.pending(), 0);
        assert_eq!(transport.posts.lock().len(), 1);
    }

    #[tokio::test]
    async fn empty_reference_is_never_posted() {
        let transport = Arc::new(GatedPost::default());
        let populator = populator(Arc::clone(&transport));
        assert!(populator.populate(&ImageReference::new("")).is_none());
        assert!(transport.posts.lock().is_empty());
    }
}
