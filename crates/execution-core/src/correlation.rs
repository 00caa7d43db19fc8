//! Request/response correlation.
//!
//! Every request that expects an answer is parked here before it is sent:
//! 1. Caller registers the request id and gets a [`Waiter`]
//! 2. Request goes out to the gateway
//! 3. The receive path resolves or fails the entry by id, which removes it
//!    and wakes exactly that waiter
//!
//! An entry is terminal once removed. Any later resolution for the same id is
//! ignored and logged as a protocol anomaly. A waiter that gives up (deadline
//! or dropped future) removes its own entry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use model::{AccountSnapshot, RequestId};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// What a pending request is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    /// A submitted order waiting for the gateway to move its next valid id
    /// past the order id.
    OrderPlacement,
    /// An account-summary request waiting for its end marker.
    AccountSummary,
}

/// Value delivered to a resolved waiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    OrderConfirmed { next_valid_id: RequestId },
    AccountSummary(AccountSnapshot),
}

/// Reason a waiter did not get a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestFailure {
    #[error("gateway error {code}: {message}")]
    Gateway { code: i32, message: String },

    #[error("request timed out")]
    Timeout,

    #[error("connection closed while request was pending")]
    Disconnected,

    #[error("response incomplete: {0}")]
    Incomplete(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegisterError {
    #[error("request id {0} already has a pending waiter")]
    DuplicateId(RequestId),
}

type Outcome = Result<Resolution, RequestFailure>;

struct PendingRequest {
    kind: PendingKind,
    ticket: u64,
    created_at: Instant,
    /// Value decoded so far for this request only.
    partial: Option<AccountSnapshot>,
    tx: oneshot::Sender<Outcome>,
}

/// Thread-safe table of in-flight requests keyed by request id.
pub struct CorrelationTable {
    pending: DashMap<RequestId, PendingRequest>,
    next_ticket: AtomicU64,
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            next_ticket: AtomicU64::new(0),
        }
    }

    /// Park a waiter for `id`. Must be called before the request is sent.
    pub fn register(
        self: &Arc<Self>,
        id: RequestId,
        kind: PendingKind,
    ) -> Result<Waiter, RegisterError> {
        let (tx, rx) = oneshot::channel();
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);

        match self.pending.entry(id) {
            Entry::Occupied(_) => return Err(RegisterError::DuplicateId(id)),
            Entry::Vacant(slot) => {
                slot.insert(PendingRequest {
                    kind,
                    ticket,
                    created_at: Instant::now(),
                    partial: None,
                    tx,
                });
            }
        }

        debug!(request_id = id, kind = ?kind, "Registered waiter");

        Ok(Waiter {
            id,
            kind,
            ticket,
            rx,
            table: Arc::clone(self),
        })
    }

    /// Store an account-summary value on its own pending entry.
    ///
    /// Returns false if no account-summary request is pending under `id`.
    pub fn record_summary_value(&self, id: RequestId, snapshot: AccountSnapshot) -> bool {
        match self.pending.get_mut(&id) {
            Some(mut entry) if entry.kind == PendingKind::AccountSummary => {
                entry.partial = Some(snapshot);
                true
            }
            _ => false,
        }
    }

    /// Resolve `id` with `value`. Returns false if nothing was pending.
    pub fn resolve(&self, id: RequestId, value: Resolution) -> bool {
        self.complete(id, Ok(value))
    }

    /// Resolve an account-summary request with the value recorded on its own
    /// entry. An end marker with no row of its own fails the request.
    pub fn resolve_summary(&self, id: RequestId) -> bool {
        let Some((_, mut pending)) = self.pending.remove(&id) else {
            warn!(request_id = id, "Summary end for unknown or completed request");
            return false;
        };

        let outcome = match pending.partial.take() {
            Some(snapshot) => Ok(Resolution::AccountSummary(snapshot)),
            None => Err(RequestFailure::Incomplete(
                "account summary ended without an available-funds row".to_string(),
            )),
        };
        deliver(id, pending, outcome);
        true
    }

    /// Fail `id`. Returns false if nothing was pending.
    pub fn fail(&self, id: RequestId, failure: RequestFailure) -> bool {
        self.complete(id, Err(failure))
    }

    /// Resolve every pending order whose id is below `next_valid_id`.
    ///
    /// The gateway only announces an id above an order once it has taken that
    /// order, so those ids can no longer be reused.
    pub fn confirm_orders_below(&self, next_valid_id: RequestId) -> usize {
        let confirmed: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|entry| entry.kind == PendingKind::OrderPlacement && *entry.key() < next_valid_id)
            .map(|entry| *entry.key())
            .collect();

        confirmed
            .into_iter()
            .filter(|id| {
                self.pending
                    .remove(id)
                    .map(|(_, pending)| {
                        deliver(*id, pending, Ok(Resolution::OrderConfirmed { next_valid_id }))
                    })
                    .is_some()
            })
            .count()
    }

    /// Fail every pending request. Used when the connection goes away.
    pub fn fail_all(&self, failure: RequestFailure) -> usize {
        let ids: Vec<RequestId> = self.pending.iter().map(|entry| *entry.key()).collect();

        ids.into_iter()
            .filter(|id| {
                self.pending
                    .remove(id)
                    .map(|(_, pending)| deliver(*id, pending, Err(failure.clone())))
                    .is_some()
            })
            .count()
    }

    /// Get the number of pending requests.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.pending.contains_key(&id)
    }

    fn complete(&self, id: RequestId, outcome: Outcome) -> bool {
        match self.pending.remove(&id) {
            Some((_, pending)) => {
                deliver(id, pending, outcome);
                true
            }
            None => {
                warn!(request_id = id, "Resolution for unknown or completed request ignored");
                false
            }
        }
    }

    /// Remove the entry only if it still belongs to the waiter holding `ticket`.
    fn cancel(&self, id: RequestId, ticket: u64) {
        if self
            .pending
            .remove_if(&id, |_, pending| pending.ticket == ticket)
            .is_some()
        {
            debug!(request_id = id, "Waiter abandoned, entry removed");
        }
    }
}

fn deliver(id: RequestId, pending: PendingRequest, outcome: Outcome) {
    let elapsed_ms = pending.created_at.elapsed().as_millis() as u64;
    if pending.tx.send(outcome).is_err() {
        debug!(request_id = id, elapsed_ms, "Waiter already gone");
    } else {
        debug!(request_id = id, kind = ?pending.kind, elapsed_ms, "Waiter completed");
    }
}

/// Handle a caller awaits for its correlated result.
pub struct Waiter {
    id: RequestId,
    kind: PendingKind,
    ticket: u64,
    rx: oneshot::Receiver<Outcome>,
    table: SharedCorrelationTable,
}

impl Waiter {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn kind(&self) -> PendingKind {
        self.kind
    }

    /// Wait for the entry to be resolved, up to `timeout`.
    ///
    /// On timeout the entry is removed, so a late answer is treated as a
    /// resolution for an unknown request.
    pub async fn wait(mut self, timeout: Duration) -> Result<Resolution, RequestFailure> {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(outcome)) => outcome,
            // Sender dropped without a value: the entry was torn down.
            Ok(Err(_)) => Err(RequestFailure::Disconnected),
            Err(_) => Err(RequestFailure::Timeout),
        }
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        self.table.cancel(self.id, self.ticket);
    }
}

/// Shared handle to the correlation table.
pub type SharedCorrelationTable = Arc<CorrelationTable>;

/// Create a new shared correlation table.
pub fn create_correlation_table() -> SharedCorrelationTable {
    Arc::new(CorrelationTable::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const WAIT: Duration = Duration::from_secs(2);

    fn snapshot(funds: rust_decimal::Decimal) -> AccountSnapshot {
        AccountSnapshot {
            account: "DU123".into(),
            available_funds: funds,
            currency: "USD".into(),
        }
    }

    #[tokio::test]
    async fn test_resolve_wakes_waiter() {
        let table = create_correlation_table();
        let waiter = table.register(5, PendingKind::AccountSummary).unwrap();
        assert_eq!(table.len(), 1);

        assert!(table.resolve(5, Resolution::AccountSummary(snapshot(dec!(10)))));

        let result = waiter.wait(WAIT).await.unwrap();
        assert_eq!(result, Resolution::AccountSummary(snapshot(dec!(10))));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_resolution_before_wait_is_kept() {
        let table = create_correlation_table();
        let waiter = table.register(1, PendingKind::OrderPlacement).unwrap();

        // Answer lands before the caller starts waiting
        table.resolve(1, Resolution::OrderConfirmed { next_valid_id: 2 });

        assert_eq!(
            waiter.wait(WAIT).await,
            Ok(Resolution::OrderConfirmed { next_valid_id: 2 })
        );
    }

    #[tokio::test]
    async fn test_second_resolution_is_noop() {
        let table = create_correlation_table();
        let waiter = table.register(9, PendingKind::AccountSummary).unwrap();

        assert!(table.resolve(9, Resolution::AccountSummary(snapshot(dec!(1)))));
        assert!(!table.resolve(9, Resolution::AccountSummary(snapshot(dec!(2)))));
        assert!(!table.fail(9, RequestFailure::Disconnected));

        assert_eq!(
            waiter.wait(WAIT).await,
            Ok(Resolution::AccountSummary(snapshot(dec!(1))))
        );
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let table = create_correlation_table();
        let _waiter = table.register(3, PendingKind::OrderPlacement).unwrap();

        assert!(matches!(
            table.register(3, PendingKind::AccountSummary),
            Err(RegisterError::DuplicateId(3))
        ));
        assert!(table.contains(3));
    }

    #[tokio::test]
    async fn test_fail_reaches_only_matching_waiter() {
        let table = create_correlation_table();
        let failed = table.register(1, PendingKind::OrderPlacement).unwrap();
        let other = table.register(2, PendingKind::OrderPlacement).unwrap();

        table.fail(
            1,
            RequestFailure::Gateway {
                code: 201,
                message: "Order rejected".into(),
            },
        );

        assert_eq!(
            failed.wait(WAIT).await,
            Err(RequestFailure::Gateway {
                code: 201,
                message: "Order rejected".into(),
            })
        );
        assert!(table.contains(2));
        drop(other);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_removes_entry() {
        let table = create_correlation_table();
        let waiter = table.register(4, PendingKind::AccountSummary).unwrap();

        let result = waiter.wait(Duration::from_millis(10)).await;
        assert_eq!(result, Err(RequestFailure::Timeout));
        assert!(table.is_empty());

        // Late answer is an anomaly, not a crash
        assert!(!table.resolve_summary(4));
    }

    #[tokio::test]
    async fn test_summary_resolves_with_its_own_row() {
        let table = create_correlation_table();
        let waiter = table.register(11, PendingKind::AccountSummary).unwrap();

        assert!(table.record_summary_value(11, snapshot(dec!(1))));
        // A later row for the same request replaces the earlier one
        assert!(table.record_summary_value(11, snapshot(dec!(1234.56))));
        assert!(table.resolve_summary(11));

        assert_eq!(
            waiter.wait(WAIT).await,
            Ok(Resolution::AccountSummary(snapshot(dec!(1234.56))))
        );
    }

    #[tokio::test]
    async fn test_summary_without_own_row_is_incomplete() {
        let table = create_correlation_table();
        let answered = table.register(1, PendingKind::AccountSummary).unwrap();
        let without = table.register(2, PendingKind::AccountSummary).unwrap();

        // Request 1's row must not leak into request 2
        table.record_summary_value(1, snapshot(dec!(5)));
        table.resolve_summary(1);
        table.resolve_summary(2);

        assert_eq!(
            answered.wait(WAIT).await,
            Ok(Resolution::AccountSummary(snapshot(dec!(5))))
        );
        assert!(matches!(
            without.wait(WAIT).await,
            Err(RequestFailure::Incomplete(_))
        ));
    }

    #[test]
    fn test_summary_value_ignored_for_orders() {
        let table = create_correlation_table();
        let _waiter = table.register(1, PendingKind::OrderPlacement).unwrap();
        assert!(!table.record_summary_value(1, snapshot(dec!(1))));
        assert!(!table.record_summary_value(2, snapshot(dec!(1))));
    }

    #[tokio::test]
    async fn test_confirm_orders_below() {
        let table = create_correlation_table();
        let first = table.register(10, PendingKind::OrderPlacement).unwrap();
        let second = table.register(11, PendingKind::OrderPlacement).unwrap();
        let summary = table.register(5, PendingKind::AccountSummary).unwrap();

        assert_eq!(table.confirm_orders_below(11), 1);
        assert_eq!(
            first.wait(WAIT).await,
            Ok(Resolution::OrderConfirmed { next_valid_id: 11 })
        );
        assert!(table.contains(11));
        // Summaries are never confirmed by id announcements
        assert!(table.contains(5));

        assert_eq!(table.confirm_orders_below(12), 1);
        assert!(second.wait(WAIT).await.is_ok());
        drop(summary);
    }

    #[tokio::test]
    async fn test_fail_all_releases_everyone() {
        let table = create_correlation_table();
        let a = table.register(1, PendingKind::AccountSummary).unwrap();
        let b = table.register(2, PendingKind::OrderPlacement).unwrap();

        assert_eq!(table.fail_all(RequestFailure::Disconnected), 2);
        assert_eq!(a.wait(WAIT).await, Err(RequestFailure::Disconnected));
        assert_eq!(b.wait(WAIT).await, Err(RequestFailure::Disconnected));
        assert_eq!(table.fail_all(RequestFailure::Disconnected), 0);
    }

    #[tokio::test]
    async fn test_concurrent_waiters_each_get_their_own_value() {
        let table = create_correlation_table();
        let waiters: Vec<_> = (0..16)
            .map(|id| table.register(id, PendingKind::AccountSummary).unwrap())
            .collect();

        let resolver = table.clone();
        tokio::spawn(async move {
            for id in (0..16).rev() {
                resolver.record_summary_value(id, snapshot(rust_decimal::Decimal::from(id)));
                resolver.resolve_summary(id);
            }
        });

        for waiter in waiters {
            let id = waiter.id();
            let result = waiter.wait(WAIT).await.unwrap();
            assert_eq!(
                result,
                Resolution::AccountSummary(snapshot(rust_decimal::Decimal::from(id)))
            );
        }
    }
}
