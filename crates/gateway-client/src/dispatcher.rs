//! Inbound callback dispatch.
//!
//! Exactly one dispatcher task consumes the gateway's event channel. It never
//! waits on callers; it only resolves waiters and updates shared state.

use std::sync::Arc;

use connector_core::EventReceiver;
use model::{GatewayEvent, PositionRow, RequestId};
use tokio::sync::watch;
use tracing::{debug, info};

/// Receiver of decoded gateway callbacks.
pub trait EventSink: Send + Sync {
    fn on_next_valid_id(&self, next_valid_id: RequestId);

    fn on_account_summary(
        &self,
        req_id: RequestId,
        account: &str,
        tag: &str,
        value: &str,
        currency: &str,
    );

    fn on_account_summary_end(&self, req_id: RequestId);

    /// `req_id` is the notification sentinel for messages that belong to no
    /// request.
    fn on_error(&self, req_id: RequestId, code: i32, message: &str);

    fn on_position(&self, row: PositionRow);

    fn on_position_end(&self);

    /// The transport closed the event channel.
    fn on_connection_closed(&self);
}

/// Route one event to the matching sink callback.
pub fn dispatch(sink: &dyn EventSink, event: GatewayEvent) {
    debug!(kind = event.kind(), "Dispatching gateway event");

    match event {
        GatewayEvent::NextValidId(id) => sink.on_next_valid_id(id),
        GatewayEvent::AccountSummary {
            req_id,
            account,
            tag,
            value,
            currency,
        } => sink.on_account_summary(req_id, &account, &tag, &value, &currency),
        GatewayEvent::AccountSummaryEnd { req_id } => sink.on_account_summary_end(req_id),
        GatewayEvent::Error {
            req_id,
            code,
            message,
        } => sink.on_error(req_id, code, &message),
        GatewayEvent::Position(row) => sink.on_position(row),
        GatewayEvent::PositionEnd => sink.on_position_end(),
    }
}

/// Consume events until the channel closes or shutdown is signalled.
///
/// A closed channel means the transport is gone and is reported to the sink;
/// an explicit shutdown is not, since the caller handles its own teardown.
pub async fn run_dispatcher(
    mut events: EventReceiver,
    sink: Arc<dyn EventSink>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("Shutdown signal received, dispatcher stopping");
                    return;
                }
            }

            event = events.recv() => {
                match event {
                    Some(event) => dispatch(sink.as_ref(), event),
                    None => {
                        info!("Gateway event channel closed");
                        sink.on_connection_closed();
                        return;
                    }
                }
            }
        }
    }
}
