use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use saga_status::SagaStatus;
use tokio::sync::broadcast;

/// Per-saga-id slot: the retained value for late subscribers, a broadcast
/// sender for live updates, and atomics tracking eviction eligibility
/// (`spec.md` §5 "LiveStatusBus uses a concurrent map keyed by saga id;
/// per-slot `subscriber_count` and `last_access_epoch_ms` are atomic").
pub(crate) struct Slot {
    pub(crate) latest: Mutex<Option<SagaStatus>>,
    pub(crate) tx: broadcast::Sender<SagaStatus>,
    pub(crate) subscriber_count: AtomicU32,
    pub(crate) last_access_ms: AtomicU64,
}

impl Slot {
    pub(crate) fn new(capacity: usize, now_ms: u64) -> Self {
        Self {
            latest: Mutex::new(None),
            tx: broadcast::channel(capacity).0,
            subscriber_count: AtomicU32::new(0),
            last_access_ms: AtomicU64::new(now_ms),
        }
    }

    pub(crate) fn touch(&self, now_ms: u64) {
        self.last_access_ms.store(now_ms, Ordering::Relaxed);
    }

    pub(crate) fn is_idle(&self, now_ms: u64, idle_ttl_ms: u64) -> bool {
        self.subscriber_count.load(Ordering::Relaxed) == 0
            && now_ms.saturating_sub(self.last_access_ms.load(Ordering::Relaxed)) >= idle_ttl_ms
    }
}

/// A live subscription to one saga id's status transitions: the latest
/// retained value first (if any), then live publishes in order
/// (`spec.md` §4.5 "subscribe(id)").
pub struct LiveSubscription {
    pub(crate) first: Option<SagaStatus>,
    pub(crate) receiver: broadcast::Receiver<SagaStatus>,
    pub(crate) slot: std::sync::Arc<Slot>,
}

impl LiveSubscription {
    /// Waits for the next status transition. Returns `None` only once the
    /// slot's sender has been dropped (i.e. the bus itself is gone) —
    /// `complete()` removes the slot from the map but subscribers already
    /// holding a receiver keep observing any in-flight sends until the
    /// sender handle is actually dropped.
    pub async fn next(&mut self) -> Option<SagaStatus> {
        if let Some(first) = self.first.take() {
            return Some(first);
        }
        loop {
            match self.receiver.recv().await {
                Ok(status) => return Some(status),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for LiveSubscription {
    fn drop(&mut self) {
        self.slot.subscriber_count.fetch_sub(1, Ordering::Relaxed);
    }
}
