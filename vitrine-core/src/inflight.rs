//! Process-wide de-duplication of identical in-flight requests.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use crate::transport::FetchOutcome;

pub type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

/// Requests currently on the wire, keyed by URL.
///
/// A second caller asking for the same URL joins the pending future instead
/// of issuing another request. Entries disappear as soon as the request
/// settles, so a later caller starts fresh.
#[derive(Clone, Default)]
pub struct InflightRequests {
    pending: Arc<DashMap<String, SharedFetch>>,
}

impl fmt::Debug for InflightRequests {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InflightRequests")
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl InflightRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the request for `key`, or start it with `start`.
    ///
    /// The flag is `true` when this call started the request.
    pub fn join_or_start<F>(&self, key: &str, start: F) -> (SharedFetch, bool)
    where
        F: FnOnce() -> BoxFuture<'static, FetchOutcome>,
    {
        match self.pending.entry(key.to_string()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let pending = Arc::clone(&self.pending);
                let owned_key = key.to_string();
                let request = start();
                let shared = async move {
                    let outcome = request.await;
                    pending.remove(&owned_key);
                    outcome
                }
                .boxed()
                .shared();
                entry.insert(shared.clone());
                (shared, true)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    use crate::transport::Payload;

    #[tokio::test]
    async fn concurrent_callers_share_one_request() {
        let inflight = InflightRequests::new();
        let starts = Arc::new(AtomicUsize::new(0));
        let (release, gate) = oneshot::channel::<()>();
        let gate = gate.shared();

        let mut joined = Vec::new();
        for _ in 0..3 {
            let starts = Arc::clone(&starts);
            let gate = gate.clone();
            let (fetch, _) = inflight.join_or_start("https://cache/1", move || {
                starts.fetch_add(1, Ordering::SeqCst);
                async move {
                    let _ = gate.await;
                    FetchOutcome::Success(Payload::new(vec![1u8, 2, 3]))
                }
                .boxed()
            });
            joined.push(fetch);
        }

        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(inflight.len(), 1);

        release.send(()).unwrap();
        for fetch in joined {
            assert!(fetch.await.is_success());
        }
        assert!(inflight.is_empty());
    }

    #[tokio::test]
    async fn settled_request_is_forgotten() {
        let inflight = InflightRequests::new();
        let (first, started) = inflight
            .join_or_start("k", || async { FetchOutcome::NotFound }.boxed());
        assert!(started);
        assert_eq!(first.await, FetchOutcome::NotFound);

        let (_, started_again) = inflight
            .join_or_start("k", || async { FetchOutcome::NotFound }.boxed());
        assert!(started_again);
    }
}
