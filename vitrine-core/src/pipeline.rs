use std::sync::Arc;

use tracing::info;
use vitrine_config::Config;
use vitrine_model::{
    CanonicalAddress, ContentFingerprint, ImageReference, TokenData,
};

use crate::address::AddressNormalizer;
use crate::error::{NormalizerError, PipelineError};
use crate::fetcher::CacheFetcher;
use crate::fingerprint::fingerprint;
use crate::populate::CachePopulator;
use crate::tile::TileHandle;
use crate::transport::{HttpTransport, ImageTransport};
use crate::visibility::{Observation, Rect, ViewportObserver};

#[derive(Debug)]
struct PipelineInner {
    config: Arc<Config>,
    normalizer: AddressNormalizer,
    fetcher: CacheFetcher,
    populator: CachePopulator,
}

/// Shared resolver for every tile on a page.
///
/// Holds the gateway normalizer, the de-duplicating cache fetcher with its
/// concurrency cap, and the cache populator. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ImagePipeline {
    inner: Arc<PipelineInner>,
}

impl ImagePipeline {
    pub fn new(
        config: Config,
        transport: Arc<dyn ImageTransport>,
    ) -> Result<Self, NormalizerError> {
        let normalizer = AddressNormalizer::new(&config.gateway)?;
        let config = Arc::new(config);
        let fetcher =
            CacheFetcher::new(Arc::clone(&transport), Arc::clone(&config));
        let populator = CachePopulator::new(transport, Arc::clone(&config));

        info!(
            gateway = %config.gateway.canonical_prefix,
            cache = %config.cache.base_url,
            api = %config.cache.api_base_url,
            max_concurrent_fetches = config.http.max_concurrent_fetches,
            "image pipeline ready"
        );

        Ok(Self {
            inner: Arc::new(PipelineInner {
                config,
                normalizer,
                fetcher,
                populator,
            }),
        })
    }

    /// Pipeline over a reqwest client built from `config.http`.
    pub fn with_http(config: Config) -> Result<Self, PipelineError> {
        let transport = HttpTransport::new(&config.http)?;
        Ok(Self::new(config, Arc::new(transport))?)
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn normalizer(&self) -> &AddressNormalizer {
        &self.inner.normalizer
    }

    pub fn fetcher(&self) -> &CacheFetcher {
        &self.inner.fetcher
    }

    pub fn populator(&self) -> &CachePopulator {
        &self.inner.populator
    }

    pub fn normalize(&self, reference: &ImageReference) -> CanonicalAddress {
        self.inner.normalizer.normalize(reference)
    }

    /// Cache key of a reference, after normalization.
    pub fn fingerprint_of(
        &self,
        reference: &ImageReference,
    ) -> ContentFingerprint {
        fingerprint(&self.normalize(reference))
    }

    /// Observer for a scroll container, widened by the configured root
    /// margin.
    pub fn viewport_observer(&self, viewport: Rect) -> ViewportObserver {
        ViewportObserver::with_root_margin(
            viewport,
            self.inner.config.viewport.root_margin,
        )
    }

    /// Mount a tile for `token` in the region tracked by `observation`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn mount(
        &self,
        token: TokenData,
        observation: Observation,
    ) -> TileHandle {
        TileHandle::mount(self.clone(), token, observation)
    }
}
