//! Viewport intersection tracking.
//!
//! A [`ViewportObserver`] plays the role of the scroll container: it knows
//! the visible rectangle and every region registered against it. Scroll,
//! resize and layout events recompute intersections and wake the matching
//! [`VisibilitySignal`]s, but only on transitions. Nothing polls.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::watch;

/// Axis-aligned rectangle in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Grow the rectangle by `margin` on every side.
    pub fn expand(&self, margin: f32) -> Self {
        Self {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + margin * 2.0,
            height: self.height + margin * 2.0,
        }
    }

    /// True when the overlap has a non-zero area. Touching edges do not count.
    pub fn intersects(&self, other: &Rect) -> bool {
        let overlap_w = self.right().min(other.right()) - self.x.max(other.x);
        let overlap_h =
            self.bottom().min(other.bottom()) - self.y.max(other.y);
        overlap_w > 0.0 && overlap_h > 0.0
    }

    /// Shift vertically, as a scroll offset change does.
    pub fn scrolled_to(&self, y: f32) -> Self {
        Self { y, ..*self }
    }
}

struct Region {
    bounds: Rect,
    visible: watch::Sender<bool>,
}

struct ObserverInner {
    viewport: Mutex<Rect>,
    root_margin: f32,
    regions: DashMap<u64, Region>,
    next_id: AtomicU64,
}

impl ObserverInner {
    fn effective_viewport(&self, viewport: &Rect) -> Rect {
        viewport.expand(self.root_margin)
    }

    fn refresh(region: &Region, viewport: &Rect) -> bool {
        let now = region.bounds.intersects(viewport);
        region.visible.send_if_modified(|visible| {
            if *visible != now {
                *visible = now;
                true
            } else {
                false
            }
        })
    }
}

/// Root of visibility tracking for one scroll container.
///
/// Cheap to clone. Dropping the last clone closes every outstanding
/// [`VisibilitySignal`].
#[derive(Clone)]
pub struct ViewportObserver {
    inner: Arc<ObserverInner>,
}

impl std::fmt::Debug for ViewportObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportObserver")
            .field("viewport", &*self.inner.viewport.lock())
            .field("root_margin", &self.inner.root_margin)
            .field("regions", &self.inner.regions.len())
            .finish()
    }
}

impl ViewportObserver {
    pub fn new(viewport: Rect) -> Self {
        Self::with_root_margin(viewport, 0.0)
    }

    /// `root_margin` widens the viewport on every side so regions just
    /// outside it count as visible, the same way list overscan preloads rows.
    pub fn with_root_margin(viewport: Rect, root_margin: f32) -> Self {
        Self {
            inner: Arc::new(ObserverInner {
                viewport: Mutex::new(viewport),
                root_margin,
                regions: DashMap::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a display region. The returned guard releases it on drop.
    pub fn observe(&self, bounds: Rect) -> Observation {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = watch::channel(false);
        let region = Region {
            bounds,
            visible: sender,
        };

        // Hold the viewport lock so a concurrent scroll cannot slip between
        // the initial intersection test and the insert.
        let viewport = self.inner.viewport.lock();
        let effective = self.inner.effective_viewport(&viewport);
        ObserverInner::refresh(&region, &effective);
        self.inner.regions.insert(id, region);
        drop(viewport);

        Observation {
            id,
            observer: Arc::downgrade(&self.inner),
            signal: VisibilitySignal { receiver },
        }
    }

    /// Scroll or resize. Returns how many regions changed visibility.
    pub fn set_viewport(&self, viewport: Rect) -> usize {
        let mut current = self.inner.viewport.lock();
        *current = viewport;
        let effective = self.inner.effective_viewport(&current);
        self.inner
            .regions
            .iter()
            .filter(|entry| ObserverInner::refresh(entry.value(), &effective))
            .count()
    }

    pub fn viewport(&self) -> Rect {
        *self.inner.viewport.lock()
    }

    /// Number of live registrations.
    pub fn region_count(&self) -> usize {
        self.inner.regions.len()
    }
}

/// A registered region. Dropping it stops observation.
pub struct Observation {
    id: u64,
    observer: Weak<ObserverInner>,
    signal: VisibilitySignal,
}

impl std::fmt::Debug for Observation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observation")
            .field("id", &self.id)
            .field("visible", &self.signal.is_visible())
            .finish()
    }
}

impl Observation {
    pub fn signal(&self) -> VisibilitySignal {
        self.signal.clone()
    }

    pub fn is_visible(&self) -> bool {
        self.signal.is_visible()
    }

    /// Layout moved or resized the region.
    pub fn set_bounds(&self, bounds: Rect) {
        let Some(inner) = self.observer.upgrade() else {
            return;
        };
        let viewport = inner.viewport.lock();
        if let Some(mut region) = inner.regions.get_mut(&self.id) {
            region.bounds = bounds;
            let effective = inner.effective_viewport(&viewport);
            ObserverInner::refresh(&region, &effective);
        }
    }
}

impl Drop for Observation {
    fn drop(&mut self) {
        if let Some(inner) = self.observer.upgrade() {
            inner.regions.remove(&self.id);
        }
    }
}

/// Read side of a region's visibility.
#[derive(Debug, Clone)]
pub struct VisibilitySignal {
    receiver: watch::Receiver<bool>,
}

impl VisibilitySignal {
    pub fn is_visible(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once the region is visible.
    ///
    /// Returns `false` if observation ended first (region released or
    /// observer dropped).
    pub async fn wait_visible(&mut self) -> bool {
        loop {
            if *self.receiver.borrow_and_update() {
                return true;
            }
            if self.receiver.changed().await.is_err() {
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Rect = Rect::new(0.0, 0.0, 800.0, 600.0);

    #[test]
    fn touching_edges_do_not_intersect() {
        let below = Rect::new(0.0, 600.0, 100.0, 100.0);
        assert!(!VIEWPORT.intersects(&below));
        let overlapping = Rect::new(0.0, 599.5, 100.0, 100.0);
        assert!(VIEWPORT.intersects(&overlapping));
    }

    #[test]
    fn zero_area_region_is_never_visible() {
        let observer = ViewportObserver::new(VIEWPORT);
        let observation = observer.observe(Rect::new(10.0, 10.0, 0.0, 0.0));
        assert!(!observation.is_visible());
    }

    #[test]
    fn region_outside_viewport_starts_hidden() {
        let observer = ViewportObserver::new(VIEWPORT);
        let observation =
            observer.observe(Rect::new(0.0, 2000.0, 200.0, 200.0));
        assert!(!observation.is_visible());
    }

    #[test]
    fn scrolling_flips_visibility_both_ways() {
        let observer = ViewportObserver::new(VIEWPORT);
        let observation =
            observer.observe(Rect::new(0.0, 2000.0, 200.0, 200.0));

        assert_eq!(observer.set_viewport(VIEWPORT.scrolled_to(1700.0)), 1);
        assert!(observation.is_visible());

        assert_eq!(observer.set_viewport(VIEWPORT.scrolled_to(1750.0)), 0);
        assert_eq!(observer.set_viewport(VIEWPORT), 1);
        assert!(!observation.is_visible());
    }

    #[test]
    fn root_margin_preloads_nearby_regions() {
        let observer = ViewportObserver::with_root_margin(VIEWPORT, 250.0);
        let near = observer.observe(Rect::new(0.0, 800.0, 200.0, 200.0));
        let far = observer.observe(Rect::new(0.0, 900.0, 200.0, 200.0));
        assert!(near.is_visible());
        assert!(!far.is_visible());
    }

    #[test]
    fn dropping_observation_releases_registration() {
        let observer = ViewportObserver::new(VIEWPORT);
        for _ in 0..3 {
            let first = observer.observe(Rect::new(0.0, 0.0, 10.0, 10.0));
            let second = observer.observe(Rect::new(0.0, 20.0, 10.0, 10.0));
            assert_eq!(observer.region_count(), 2);
            drop(first);
            drop(second);
            assert_eq!(observer.region_count(), 0);
        }
    }

    #[test]
    fn layout_change_recomputes_visibility() {
        let observer = ViewportObserver::new(VIEWPORT);
        let observation = observer.observe(Rect::new(0.0, 900.0, 100.0, 100.0));
        assert!(!observation.is_visible());
        observation.set_bounds(Rect::new(0.0, 100.0, 100.0, 100.0));
        assert!(observation.is_visible());
    }

    #[tokio::test]
    async fn wait_visible_wakes_on_scroll() {
        let observer = ViewportObserver::new(VIEWPORT);
        let observation =
            observer.observe(Rect::new(0.0, 1000.0, 100.0, 100.0));
        let mut signal = observation.signal();

        let waiter = tokio::spawn(async move { signal.wait_visible().await });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        observer.set_viewport(VIEWPORT.scrolled_to(900.0));
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn wait_visible_ends_when_observation_is_released() {
        let observer = ViewportObserver::new(VIEWPORT);
        let observation =
            observer.observe(Rect::new(0.0, 1000.0, 100.0, 100.0));
        let mut signal = observation.signal();
        drop(observation);
        assert!(!signal.wait_visible().await);
    }

    #[tokio::test]
    async fn dropping_observer_closes_signals() {
        let observer = ViewportObserver::new(VIEWPORT);
        let observation =
            observer.observe(Rect::new(0.0, 1000.0, 100.0, 100.0));
        let mut signal = observation.signal();
        drop(observer);
        assert!(!signal.wait_visible().await);
        drop(observation);
    }
}
