//! Per-token tile: the visibility-gated resolve state machine and the view
//! it publishes.
//!
//! A tile starts `Idle` and does nothing until its region becomes visible.
//! It then probes the rendition cache, falls back to the original asset on a
//! miss, and warms the cache once the original has been shown. Every state
//! change goes through one lock that also holds the mounted flag, so once a
//! tile is unmounted nothing it started can touch its view again.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use vitrine_model::{CanonicalAddress, RenderableImage, TokenData};

use crate::error::ResolveError;
use crate::fingerprint::fingerprint;
use crate::pipeline::ImagePipeline;
use crate::render::decode;
use crate::transport::{FetchOutcome, TransportError};
use crate::visibility::{Observation, VisibilitySignal};

/// Where the shown image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    Cache,
    Original,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TilePhase {
    /// Mounted, not yet visible.
    Idle,
    ProbingCache,
    FetchingOriginal,
    Rendered(ImageSource),
    /// The original could not be fetched or decoded. Not retried.
    Failed,
    /// No image reference; nothing to fetch.
    Empty,
}

impl TilePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TilePhase::Rendered(_) | TilePhase::Failed | TilePhase::Empty
        )
    }
}

/// What the gallery renders for one token: a link to the token page
/// wrapping either the image or a square placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct TileView {
    pub key: String,
    pub href: String,
    pub image: Option<RenderableImage>,
    pub phase: TilePhase,
}

impl TileView {
    fn for_token(token: &TokenData) -> Self {
        Self {
            key: token.key(),
            href: token.href(),
            image: None,
            phase: TilePhase::Idle,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.image.is_none()
    }
}

/// Remote requests a tile has issued during its current mount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestLedger {
    pub probed: bool,
    pub fetched_original: bool,
    pub populated: bool,
}

#[derive(Debug, Clone, Copy)]
enum Request {
    Probe,
    Original,
}

#[derive(Debug)]
struct TileState {
    mounted: bool,
    ledger: RequestLedger,
    populate: Option<JoinHandle<()>>,
}

#[derive(Debug)]
struct TileShared {
    state: Mutex<TileState>,
    view: watch::Sender<TileView>,
}

impl TileShared {
    /// Apply `update` to the view unless the tile is gone.
    fn apply(&self, update: impl FnOnce(&mut TileView)) -> bool {
        let state = self.state.lock();
        if !state.mounted {
            return false;
        }
        self.view.send_modify(update);
        true
    }

    fn set_phase(&self, phase: TilePhase) -> bool {
        self.apply(|view| view.phase = phase)
    }

    /// Record `request` in the ledger. `false` if the tile is unmounted or
    /// the request was already issued.
    fn claim(&self, request: Request) -> bool {
        let mut state = self.state.lock();
        if !state.mounted {
            return false;
        }
        let slot = match request {
            Request::Probe => &mut state.ledger.probed,
            Request::Original => &mut state.ledger.fetched_original,
        };
        !std::mem::replace(slot, true)
    }

    /// Show the original and start the cache populate, both under the
    /// lock, so anyone who sees the rendered view also sees the populate.
    fn render_original(
        &self,
        image: RenderableImage,
        populate: impl FnOnce() -> Option<JoinHandle<()>>,
    ) -> bool {
        let mut state = self.state.lock();
        if !state.mounted {
            return false;
        }
        if !std::mem::replace(&mut state.ledger.populated, true) {
            state.populate = populate();
        }
        self.view.send_modify(|view| {
            view.image = Some(image);
            view.phase = TilePhase::Rendered(ImageSource::Original);
        });
        true
    }

    fn is_mounted(&self) -> bool {
        self.state.lock().mounted
    }
}

/// A mounted tile.
///
/// Dropping the handle unmounts the tile: its region stops being observed
/// and results still on the wire are discarded when they land.
#[derive(Debug)]
pub struct TileHandle {
    token: TokenData,
    shared: Arc<TileShared>,
    observation: Observation,
    driver: Option<JoinHandle<()>>,
}

impl TileHandle {
    pub(crate) fn mount(
        pipeline: ImagePipeline,
        token: TokenData,
        observation: Observation,
    ) -> Self {
        let address = pipeline.normalize(&token.image);
        let mut initial = TileView::for_token(&token);
        if address.is_empty() {
            initial.phase = TilePhase::Empty;
        }

        let (view, _) = watch::channel(initial);
        let shared = Arc::new(TileShared {
            state: Mutex::new(TileState {
                mounted: true,
                ledger: RequestLedger::default(),
                populate: None,
            }),
            view,
        });

        let driver = (!address.is_empty()).then(|| {
            tokio::spawn(drive(
                pipeline,
                token.clone(),
                address,
                Arc::clone(&shared),
                observation.signal(),
            ))
        });

        Self {
            token,
            shared,
            observation,
            driver,
        }
    }

    pub fn token(&self) -> &TokenData {
        &self.token
    }

    /// Current view. Reading it never triggers network activity.
    pub fn view(&self) -> TileView {
        self.shared.view.borrow().clone()
    }

    pub fn phase(&self) -> TilePhase {
        self.shared.view.borrow().phase
    }

    pub fn is_visible(&self) -> bool {
        self.observation.is_visible()
    }

    pub fn requests(&self) -> RequestLedger {
        self.shared.state.lock().ledger
    }

    /// Receiver notified on every view change.
    pub fn subscribe(&self) -> watch::Receiver<TileView> {
        self.shared.view.subscribe()
    }

    /// Wait for a terminal phase.
    ///
    /// A tile that never becomes visible never settles.
    pub async fn settled(&self) -> TileView {
        let mut receiver = self.subscribe();
        match receiver.wait_for(|view| view.phase.is_terminal()).await {
            Ok(view) => view.clone(),
            Err(_) => self.view(),
        }
    }

    /// Task of the cache populate this mount started, if it started one.
    ///
    /// The populate runs on its own either way; the handle only lets a
    /// short-lived caller wait for it.
    pub fn take_populate(&self) -> Option<JoinHandle<()>> {
        self.shared.state.lock().populate.take()
    }

    /// Unmount now. The returned task, if any, ends once the state machine
    /// notices; results it is still waiting on are dropped on arrival.
    pub fn unmount(mut self) -> Option<JoinHandle<()>> {
        self.driver.take()
    }
}

impl Drop for TileHandle {
    fn drop(&mut self) {
        self.shared.state.lock().mounted = false;
    }
}

async fn drive(
    pipeline: ImagePipeline,
    token: TokenData,
    address: CanonicalAddress,
    shared: Arc<TileShared>,
    mut signal: VisibilitySignal,
) {
    if !signal.wait_visible().await
        || !shared.set_phase(TilePhase::ProbingCache)
    {
        return;
    }

    if shared.claim(Request::Probe) {
        match probe_cache(&pipeline, &address).await {
            Ok(image) => {
                shared.apply(|view| {
                    view.image = Some(image);
                    view.phase = TilePhase::Rendered(ImageSource::Cache);
                });
                return;
            }
            Err(miss) => {
                debug!(
                    key = %token.key(),
                    error = %miss,
                    "falling back to original"
                );
            }
        }
    }

    // Scrolled away during the probe: wait to come back.
    if !shared.is_mounted() || !signal.wait_visible().await {
        return;
    }
    if !shared.set_phase(TilePhase::FetchingOriginal)
        || !shared.claim(Request::Original)
    {
        return;
    }

    match fetch_original(&pipeline, &address).await {
        Ok(image) => {
            shared.render_original(image, || {
                pipeline.populator().populate(&token.image)
            });
        }
        Err(err) => {
            if shared.set_phase(TilePhase::Failed) {
                warn!(key = %token.key(), error = %err, "showing placeholder");
            }
        }
    }
}

async fn probe_cache(
    pipeline: &ImagePipeline,
    address: &CanonicalAddress,
) -> Result<RenderableImage, ResolveError> {
    let fingerprint = fingerprint(address);
    match pipeline.fetcher().probe(fingerprint).await {
        FetchOutcome::Success(payload) => Ok(decode(&payload)?),
        FetchOutcome::NotFound => Err(ResolveError::CacheMiss {
            fingerprint,
            cause: None,
        }),
        FetchOutcome::Transport(cause) => Err(ResolveError::CacheMiss {
            fingerprint,
            cause: Some(cause),
        }),
    }
}

async fn fetch_original(
    pipeline: &ImagePipeline,
    address: &CanonicalAddress,
) -> Result<RenderableImage, ResolveError> {
    let cause = match pipeline.fetcher().fetch_original(address).await {
        FetchOutcome::Success(payload) => return Ok(decode(&payload)?),
        FetchOutcome::NotFound => TransportError::Status {
            url: address.to_string(),
            status: 404,
        },
        FetchOutcome::Transport(cause) => cause,
    };
    Err(ResolveError::OriginalFetch {
        address: address.clone(),
        cause,
    })
}
