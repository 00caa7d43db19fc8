//! Request/order id allocation.
//!
//! The gateway announces the lowest id it will accept, once at handshake and
//! again whenever asked. Ids handed out here are strictly increasing; a late
//! or stale announcement can raise the counter but never lower it, so an id
//! is never handed out twice.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use model::RequestId;
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

const UNSEEDED: RequestId = RequestId::MIN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocatorError {
    /// The gateway has not announced a next valid id yet.
    #[error("order id allocator not ready: no next valid id received")]
    NotReady,
}

/// Thread-safe id allocator seeded by the gateway.
#[derive(Debug)]
pub struct OrderIdAllocator {
    next: AtomicI64,
    ready: watch::Sender<bool>,
}

impl Default for OrderIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderIdAllocator {
    pub fn new() -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            next: AtomicI64::new(UNSEEDED),
            ready,
        }
    }

    /// Record a next-valid-id announcement.
    ///
    /// Returns the id the next call to [`next`](Self::next) will hand out.
    pub fn seed(&self, next_valid_id: RequestId) -> RequestId {
        let previous = self.next.fetch_max(next_valid_id, Ordering::SeqCst);
        let effective = previous.max(next_valid_id);
        if previous != UNSEEDED && previous > next_valid_id {
            debug!(
                announced = next_valid_id,
                next = effective,
                "Gateway announced an id below ones already handed out"
            );
        }
        self.ready.send_replace(true);
        effective
    }

    /// Hand out the next id.
    pub fn next(&self) -> Result<RequestId, AllocatorError> {
        self.next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current != UNSEEDED).then(|| current + 1)
            })
            .map_err(|_| AllocatorError::NotReady)
    }

    /// The id the next allocation would return, if seeded.
    pub fn peek(&self) -> Option<RequestId> {
        let current = self.next.load(Ordering::SeqCst);
        (current != UNSEEDED).then_some(current)
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Wait until the first announcement arrives, up to `timeout`.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<(), AllocatorError> {
        let mut rx = self.ready.subscribe();
        let seeded = async { rx.wait_for(|ready| *ready).await.is_ok() };
        let result = tokio::time::timeout(timeout, seeded).await;
        match result {
            Ok(true) => Ok(()),
            _ => Err(AllocatorError::NotReady),
        }
    }
}
