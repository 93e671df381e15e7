//! # Vitrine Core
//!
//! Image resolution for token gallery tiles: gateway normalization, cache
//! fingerprints, visibility gating, cache probe with fallback to the original
//! asset, and fire-and-forget cache warming.
//!
//! ## Overview
//!
//! - [`address`]: rewrites `ipfs://` URIs and alternate gateway URLs onto the
//!   canonical gateway
//! - [`fingerprint`]: the 32-bit key under which the shared cache store files
//!   a rendition
//! - [`visibility`]: viewport intersection tracking and per-region signals
//! - [`fetcher`]: cache probe and original fetch, de-duplicated and capped
//! - [`populate`]: asks the backend to ingest an original into the cache
//! - [`tile`]: the per-token state machine and the view it publishes
//! - [`pipeline`]: the facade tying the above together
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use vitrine_config::Config;
//! use vitrine_core::{HttpTransport, ImagePipeline, Rect};
//! use vitrine_model::TokenData;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let transport = Arc::new(HttpTransport::new(&config.http)?);
//! let pipeline = ImagePipeline::new(config, transport)?;
//!
//! let observer =
//!     pipeline.viewport_observer(Rect::new(0.0, 0.0, 1280.0, 800.0));
//! let token = TokenData::new("0xabc", "7", "ipfs://abc123/img.png")?;
//! let region = observer.observe(Rect::new(0.0, 0.0, 256.0, 256.0));
//! let tile = pipeline.mount(token, region);
//!
//! let view = tile.settled().await;
//! println!("{} placeholder={}", view.href, view.is_placeholder());
//! # Ok(())
//! # }
//! ```

#![allow(missing_docs)]

pub mod address;
pub mod error;
pub mod fetcher;
pub mod fingerprint;
pub mod inflight;
pub mod pipeline;
pub mod populate;
pub mod render;
pub mod tile;
pub mod transport;
pub mod visibility;

pub use address::{AddressNormalizer, Normalization};
pub use error::{NormalizerError, PipelineError, ResolveError};
pub use fetcher::CacheFetcher;
pub use fingerprint::{fingerprint, fingerprint_str};
pub use pipeline::ImagePipeline;
pub use populate::CachePopulator;
pub use tile::{ImageSource, RequestLedger, TileHandle, TilePhase, TileView};
pub use transport::{
    FetchOutcome, HttpTransport, ImageTransport, Payload, TransportError,
};
pub use visibility::{Observation, Rect, ViewportObserver, VisibilitySignal};
