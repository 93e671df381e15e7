use thiserror::Error;
use vitrine_config::ConfigGuardRailError;
use vitrine_model::{CanonicalAddress, ContentFingerprint, ModelError};

use crate::transport::TransportError;

/// Why a tile did not end up showing an image, or why warming failed.
///
/// None of these leave the tile: they are logged and folded into a local
/// placeholder state.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no cached rendition for fingerprint {fingerprint}")]
    CacheMiss {
        fingerprint: ContentFingerprint,
        #[source]
        cause: Option<TransportError>,
    },
    #[error("failed to fetch original asset {address}")]
    OriginalFetch {
        address: CanonicalAddress,
        #[source]
        cause: TransportError,
    },
    #[error("cache populate request for '{reference}' failed")]
    Populate {
        reference: String,
        #[source]
        cause: TransportError,
    },
    #[error("payload could not be turned into an image")]
    Decode(#[from] ModelError),
}

#[derive(Debug, Error)]
pub enum NormalizerError {
    #[error(transparent)]
    InvalidRules(#[from] ConfigGuardRailError),
}

/// Failure to assemble an [`ImagePipeline`](crate::ImagePipeline).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Normalizer(#[from] NormalizerError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
