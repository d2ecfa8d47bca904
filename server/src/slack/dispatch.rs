//! Event Dispatch
//!
//! Keyed registry of async handlers with timeout-bounded concurrent fan-out.
//! One instance serves business events (keyed by event name), two more serve
//! exception routing (keyed by error kind and by event name).

use std::borrow::Borrow;
use std::fmt::Debug;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tracing::{debug, warn};

/// Default ceiling for one fan-out batch.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(5);

/// A stored handler. Failures are already absorbed by the time one of these
/// is registered, so the future resolves to `()`.
pub type Handler<P> = Arc<dyn Fn(Arc<P>) -> BoxFuture<'static, ()> + Send + Sync>;

/// What happened during one `dispatch` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Handlers started for the key.
    pub handlers: usize,
    /// Handlers that ran to completion before the ceiling.
    pub finished: usize,
    /// Whether the ceiling cut the batch short.
    pub timed_out: bool,
}

/// Registry mapping keys to ordered handler lists.
pub struct EventDispatcher<K, P> {
    handlers: DashMap<K, Vec<Handler<P>>>,
    timeout: Duration,
}

impl<K, P> Default for EventDispatcher<K, P>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::with_timeout(DEFAULT_DISPATCH_TIMEOUT)
    }
}

impl<K, P> EventDispatcher<K, P>
where
    K: Eq + Hash,
{
    /// Create a dispatcher with the default 5 second ceiling.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dispatcher with a custom ceiling.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            handlers: DashMap::new(),
            timeout,
        }
    }

    /// The fan-out ceiling.
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Append a handler for `key`. Duplicates are kept.
    pub fn add(&self, key: K, handler: Handler<P>) {
        self.handlers.entry(key).or_default().push(handler);
    }

    /// Whether any handler is registered for `key`.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.handlers.contains_key(key)
    }

    /// Number of handlers registered for `key`.
    pub fn handler_count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.handlers.get(key).map_or(0, |entry| entry.len())
    }

    /// All keys with at least one handler, in no particular order.
    pub fn event_names(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.handlers.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl<K, P> EventDispatcher<K, P>
where
    K: Eq + Hash + Debug + Send + Sync,
    P: Send + Sync + 'static,
{
    /// Run every handler registered for `key` concurrently with `payload`.
    ///
    /// Handlers are polled inside the calling task and start in registration
    /// order. Resolves when all handlers finish or the ceiling elapses,
    /// whichever comes first. Handlers still running at the ceiling are
    /// dropped at their current suspension point. An unknown key is a no-op.
    pub async fn dispatch<Q>(&self, key: &Q, payload: Arc<P>) -> DispatchSummary
    where
        K: Borrow<Q>,
        Q: Eq + Hash + Debug + Sync + ?Sized,
    {
        // Snapshot the list so no map guard is held across an await.
        let handlers = match self.handlers.get(key) {
            Some(entry) => entry.value().clone(),
            None => return DispatchSummary::default(),
        };

        let mut jobs: FuturesUnordered<_> = handlers
            .iter()
            .map(|handler| AssertUnwindSafe(handler(Arc::clone(&payload))).catch_unwind())
            .collect();

        let mut finished = 0;
        let drained = tokio::time::timeout(self.timeout, async {
            while let Some(outcome) = jobs.next().await {
                if outcome.is_err() {
                    warn!(key = ?key, "Handler panicked");
                }
                finished += 1;
            }
        })
        .await;

        let timed_out = drained.is_err();
        if timed_out {
            drop(jobs);
            warn!(
                key = ?key,
                handlers = handlers.len(),
                finished,
                timeout_ms = self.timeout.as_millis() as u64,
                "Dispatch ceiling reached, dropped remaining handlers"
            );
        } else {
            debug!(key = ?key, handlers = handlers.len(), "Dispatch complete");
        }

        DispatchSummary {
            handlers: handlers.len(),
            finished,
            timed_out,
        }
    }
}
