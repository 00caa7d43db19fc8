//! The client facade.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use common::ExponentialBackoff;
use connector_core::{create_event_channel, Gateway};
use execution_core::{
    classify, create_correlation_table, OrderIdAllocator, PendingKind, RequestFailure,
    Resolution, SharedCorrelationTable, Waiter,
};
use metrics::{create_metrics, MetricsSnapshot, SharedMetrics};
use model::{
    AccountSnapshot, InstrumentDescriptor, OrderAction, OrderIntent, PositionRow, RequestId,
    AVAILABLE_FUNDS_TAG, NOTIFICATION_REQUEST_ID,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::dispatcher::{run_dispatcher, EventSink};
use crate::error::ClientError;
use crate::positions::{PositionCallback, PositionUpdate};

/// Backoff ceiling between connection attempts.
const MAX_CONNECT_BACKOFF: std::time::Duration = std::time::Duration::from_secs(30);

/// An order the gateway has taken.
///
/// "Taken" means submitted under an id the gateway has since moved past. It
/// says nothing about fills or venue-side validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAcceptance {
    pub order_id: RequestId,
    pub instrument: InstrumentDescriptor,
    pub intent: OrderIntent,
    /// The gateway's next valid id when the order was confirmed.
    pub next_valid_id: RequestId,
}

/// State shared between the facade and the dispatcher task.
struct ClientCore {
    allocator: OrderIdAllocator,
    table: SharedCorrelationTable,
    /// Last available-funds row seen on any request. Only reported through
    /// `last_account_snapshot`; requests resolve from their own rows.
    account: Mutex<Option<AccountSnapshot>>,
    positions: Mutex<Option<PositionCallback>>,
    connection_lost: AtomicBool,
    metrics: SharedMetrics,
}

impl ClientCore {
    fn new(metrics: SharedMetrics) -> Self {
        Self {
            allocator: OrderIdAllocator::new(),
            table: create_correlation_table(),
            account: Mutex::new(None),
            positions: Mutex::new(None),
            connection_lost: AtomicBool::new(false),
            metrics,
        }
    }

    fn forward_position(&self, update: PositionUpdate) {
        // Clone out so the callback may (un)subscribe without deadlocking.
        let callback = self.positions.lock().clone();
        match callback {
            Some(callback) => callback(update),
            None => debug!("Position update with no subscriber dropped"),
        }
    }
}

impl EventSink for ClientCore {
    fn on_next_valid_id(&self, next_valid_id: RequestId) {
        self.metrics.inc_events_received();
        let next = self.allocator.seed(next_valid_id);
        let confirmed = self.table.confirm_orders_below(next_valid_id);
        debug!(next_valid_id, next, confirmed, "Next valid id received");
    }

    fn on_account_summary(
        &self,
        req_id: RequestId,
        account: &str,
        tag: &str,
        value: &str,
        currency: &str,
    ) {
        self.metrics.inc_events_received();
        if tag != AVAILABLE_FUNDS_TAG {
            debug!(req_id, tag, "Ignoring account summary tag");
            return;
        }

        let available_funds = match Decimal::from_str(value) {
            Ok(v) => v,
            Err(e) => {
                self.metrics.inc_protocol_anomalies();
                warn!(req_id, value, error = %e, "Unparsable available funds value");
                return;
            }
        };

        let snapshot = AccountSnapshot {
            account: account.to_string(),
            available_funds,
            currency: currency.to_string(),
        };
        *self.account.lock() = Some(snapshot.clone());

        if !self.table.record_summary_value(req_id, snapshot) {
            debug!(req_id, "Account summary row for request with no waiter");
        }
    }

    fn on_account_summary_end(&self, req_id: RequestId) {
        self.metrics.inc_events_received();
        if !self.table.resolve_summary(req_id) {
            self.metrics.inc_protocol_anomalies();
        }
    }

    fn on_error(&self, req_id: RequestId, code: i32, message: &str) {
        self.metrics.inc_events_received();
        if req_id == NOTIFICATION_REQUEST_ID {
            self.metrics.inc_notifications();
            info!(code, message, "Gateway notification");
            return;
        }

        self.metrics.inc_gateway_errors();
        let failure = RequestFailure::Gateway {
            code,
            message: message.to_string(),
        };
        if !self.table.fail(req_id, failure) {
            warn!(req_id, code, message, "Gateway error for request with no waiter");
        }
    }

    fn on_position(&self, row: PositionRow) {
        self.metrics.inc_events_received();
        self.metrics.inc_position_rows();
        self.forward_position(PositionUpdate::Row(row));
    }

    fn on_position_end(&self) {
        self.metrics.inc_events_received();
        self.forward_position(PositionUpdate::End);
    }

    fn on_connection_closed(&self) {
        if !self.connection_lost.swap(true, Ordering::SeqCst) {
            let released = self.table.fail_all(RequestFailure::Disconnected);
            warn!(released, "Gateway connection lost, pending requests released");
        }
    }
}

/// Long-lived client for one gateway session.
///
/// Dropping the client shuts it down.
pub struct GatewayClient {
    config: ClientConfig,
    gateway: Arc<dyn Gateway>,
    core: Arc<ClientCore>,
    shutdown_tx: watch::Sender<bool>,
    shut_down: AtomicBool,
    /// Held from id allocation until the request is handed to the transport,
    /// so ids reach the gateway in allocation order.
    submit_lock: Mutex<()>,
}

impl GatewayClient {
    /// Connect, start the dispatcher and wait for the gateway's first next
    /// valid id.
    pub async fn connect(
        gateway: Arc<dyn Gateway>,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        connect_with_retry(gateway.as_ref(), &config).await?;

        let (events_tx, events_rx) = create_event_channel(config.connector.channel_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let core = Arc::new(ClientCore::new(create_metrics()));

        let sink: Arc<dyn EventSink> = core.clone();
        tokio::spawn(run_dispatcher(events_rx, sink, shutdown_rx));

        let client = Self {
            config,
            gateway,
            core,
            shutdown_tx,
            shut_down: AtomicBool::new(false),
            submit_lock: Mutex::new(()),
        };

        client.gateway.run(events_tx)?;

        if client
            .core
            .allocator
            .wait_ready(client.config.handshake_timeout)
            .await
            .is_err()
        {
            client.shutdown();
            return Err(ClientError::NotReady(format!(
                "no next valid id within {:?}",
                client.config.handshake_timeout
            )));
        }

        info!(
            endpoint = %client.config.connector.endpoint(),
            next_order_id = ?client.core.allocator.peek(),
            "Connected to gateway"
        );
        Ok(client)
    }

    /// Submit a market order for a typed instrument string.
    ///
    /// Unclassifiable instruments fail locally and never reach the gateway.
    /// Every order, the first of the session included, waits until the
    /// gateway announces an id above it.
    ///
    /// Once the order itself has been handed to the transport the call only
    /// ends through its waiter (confirmation, rejection, timeout or
    /// disconnect), never with a transport error that would invite a resubmit.
    pub async fn place_order(
        &self,
        instrument: &str,
        action: OrderAction,
        quantity: Decimal,
    ) -> Result<OrderAcceptance, ClientError> {
        let descriptor = classify(instrument)?;
        self.ensure_open()?;

        let intent = OrderIntent::market(action, quantity);
        let (order_id, waiter) = {
            let _submit = self.submit_lock.lock();
            let order_id = self.core.allocator.next()?;
            let waiter = self.register(order_id, PendingKind::OrderPlacement)?;

            self.gateway.place_order(order_id, &descriptor, &intent)?;
            // The gateway announces a higher id once it has taken the order.
            if let Err(e) = self.gateway.request_next_id() {
                warn!(order_id, error = %e, "Id refresh failed after order was sent");
            }
            (order_id, waiter)
        };
        self.core.metrics.inc_requests_issued();

        info!(
            order_id,
            symbol = %descriptor.symbol,
            security_type = descriptor.security_type.as_gateway_str(),
            action = %action,
            quantity = %quantity,
            "Order submitted"
        );

        match self.wait(waiter).await? {
            Resolution::OrderConfirmed { next_valid_id } => Ok(OrderAcceptance {
                order_id,
                instrument: descriptor,
                intent,
                next_valid_id,
            }),
            other => Err(ClientError::IncompleteResponse(format!(
                "unexpected resolution for order {}: {:?}",
                order_id, other
            ))),
        }
    }

    /// Funds available for trading across the configured account group.
    pub async fn get_available_funds(&self) -> Result<AccountSnapshot, ClientError> {
        self.ensure_open()?;

        let (req_id, waiter) = {
            let _submit = self.submit_lock.lock();
            let req_id = self.core.allocator.next()?;
            let waiter = self.register(req_id, PendingKind::AccountSummary)?;

            self.gateway.request_account_summary(
                req_id,
                &self.config.account_group,
                &[AVAILABLE_FUNDS_TAG],
            )?;
            (req_id, waiter)
        };
        self.core.metrics.inc_requests_issued();
        debug!(req_id, group = %self.config.account_group, "Account summary requested");

        let result = self.wait(waiter).await;

        if let Err(e) = self.gateway.cancel_account_summary(req_id) {
            debug!(req_id, error = %e, "Failed to cancel account summary");
        }

        match result? {
            Resolution::AccountSummary(snapshot) => Ok(snapshot),
            other => Err(ClientError::IncompleteResponse(format!(
                "unexpected resolution for summary {}: {:?}",
                req_id, other
            ))),
        }
    }

    /// Forward every position row to `callback`, in delivery order.
    ///
    /// Replaces any previous subscriber.
    pub fn subscribe_positions(&self, callback: PositionCallback) -> Result<(), ClientError> {
        self.ensure_open()?;
        *self.core.positions.lock() = Some(callback);

        if let Err(e) = self.gateway.request_positions() {
            self.core.positions.lock().take();
            return Err(e.into());
        }
        self.core.metrics.inc_requests_issued();
        Ok(())
    }

    /// Channel-backed position subscription.
    pub fn position_stream(&self) -> Result<mpsc::UnboundedReceiver<PositionUpdate>, ClientError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribe_positions(Arc::new(move |update: PositionUpdate| {
            let _ = tx.send(update);
        }))?;
        Ok(rx)
    }

    /// Stop the position stream.
    pub fn cancel_positions(&self) -> Result<(), ClientError> {
        if self.core.positions.lock().take().is_some() {
            self.gateway.cancel_positions()?;
        }
        Ok(())
    }

    /// Close the session and release every pending request with
    /// `Disconnected`. Safe to call any number of times.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("Disconnecting from gateway");
        self.shutdown_tx.send_replace(true);
        let released = self.core.table.fail_all(RequestFailure::Disconnected);
        self.core.positions.lock().take();
        self.gateway.disconnect();
        info!(released, "Gateway client shut down");
    }

    pub fn is_connected(&self) -> bool {
        !self.shut_down.load(Ordering::SeqCst)
            && !self.core.connection_lost.load(Ordering::SeqCst)
            && self.gateway.is_connected()
    }

    /// Id the next order will be submitted under.
    pub fn next_order_id(&self) -> Option<RequestId> {
        self.core.allocator.peek()
    }

    /// Last available-funds value reported on any request.
    pub fn last_account_snapshot(&self) -> Option<AccountSnapshot> {
        self.core.account.lock().clone()
    }

    /// Number of requests still waiting for an answer.
    pub fn pending_requests(&self) -> usize {
        self.core.table.len()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.core.metrics.snapshot()
    }

    fn is_closed(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst) || self.core.connection_lost.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), ClientError> {
        if self.is_closed() {
            Err(ClientError::Disconnected)
        } else {
            Ok(())
        }
    }

    /// Register a waiter, re-checking the closed flags afterwards so a
    /// concurrent shutdown cannot miss it.
    fn register(&self, id: RequestId, kind: PendingKind) -> Result<Waiter, ClientError> {
        let waiter = self.core.table.register(id, kind)?;
        if self.is_closed() {
            return Err(ClientError::Disconnected);
        }
        Ok(waiter)
    }

    async fn wait(&self, waiter: Waiter) -> Result<Resolution, ClientError> {
        let id = waiter.id();
        let timeout = self.config.request_timeout;

        match waiter.wait(timeout).await {
            Ok(resolution) => {
                self.core.metrics.inc_requests_resolved();
                Ok(resolution)
            }
            Err(failure) => {
                if failure == RequestFailure::Timeout {
                    self.core.metrics.inc_requests_timed_out();
                    warn!(request_id = id, timeout_ms = timeout.as_millis() as u64, "Request timed out");
                } else {
                    self.core.metrics.inc_requests_failed();
                    debug!(request_id = id, error = %failure, "Request failed");
                }
                Err(ClientError::from_failure(failure, timeout))
            }
        }
    }
}

impl Drop for GatewayClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn connect_with_retry(gateway: &dyn Gateway, config: &ClientConfig) -> Result<(), ClientError> {
    let mut backoff = ExponentialBackoff::new(config.connect_backoff, MAX_CONNECT_BACKOFF, 0.1)
        .with_max_attempts(config.connect_attempts.saturating_sub(1));

    loop {
        match gateway.connect(&config.connector).await {
            Ok(()) => return Ok(()),
            Err(e) => match backoff.next_delay() {
                Some(delay) => {
                    warn!(
                        error = %e,
                        attempt = backoff.attempt(),
                        delay_secs = delay.as_secs_f64(),
                        "Connection failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => return Err(e.into()),
            },
        }
    }
}
