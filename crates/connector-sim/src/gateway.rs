use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use connector_core::{Connection, ConnectorConfig, ConnectorError, EventSender, RequestIssuer};
use model::{
    GatewayEvent, InstrumentDescriptor, OrderIntent, RequestId, AVAILABLE_FUNDS_TAG,
    NOTIFICATION_REQUEST_ID,
};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::SimConfig;

/// Code the gateway uses for a rejected order.
const ORDER_REJECTED: i32 = 201;
/// Code the gateway uses for an order id that was already used.
const DUPLICATE_ORDER_ID: i32 = 103;

/// An order as received by the simulated gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedOrder {
    pub order_id: RequestId,
    pub instrument: InstrumentDescriptor,
    pub intent: OrderIntent,
}

enum Command {
    NextId,
    PlaceOrder(SubmittedOrder),
    AccountSummary { req_id: RequestId, tags: Vec<String> },
    CancelAccountSummary(RequestId),
    Positions,
    CancelPositions,
    Inject(GatewayEvent),
    HangUp,
}

struct SimState {
    next_order_id: RequestId,
    submitted: Vec<SubmittedOrder>,
    cancelled_summaries: Vec<RequestId>,
    positions_subscribed: bool,
}

struct Shared {
    config: SimConfig,
    state: Mutex<SimState>,
}

/// Simulated gateway implementing both transport capabilities.
pub struct SimulatedGateway {
    shared: Arc<Shared>,
    connected: AtomicBool,
    connect_attempts: AtomicU32,
    commands: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    inbox: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
    shutdown: watch::Sender<bool>,
}

impl SimulatedGateway {
    pub fn new(config: SimConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        let next_order_id = config.first_order_id;
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(SimState {
                    next_order_id,
                    submitted: Vec::new(),
                    cancelled_summaries: Vec::new(),
                    positions_subscribed: false,
                }),
            }),
            connected: AtomicBool::new(false),
            connect_attempts: AtomicU32::new(0),
            commands: Mutex::new(None),
            inbox: Mutex::new(None),
            shutdown,
        }
    }

    /// Orders received so far, including rejected ones.
    pub fn submitted_orders(&self) -> Vec<SubmittedOrder> {
        self.shared.state.lock().submitted.clone()
    }

    /// Account-summary request ids the client has cancelled.
    pub fn cancelled_summaries(&self) -> Vec<RequestId> {
        self.shared.state.lock().cancelled_summaries.clone()
    }

    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn positions_subscribed(&self) -> bool {
        self.shared.state.lock().positions_subscribed
    }

    /// Push an arbitrary callback through the receive loop, after anything
    /// already queued.
    pub fn inject(&self, event: GatewayEvent) -> Result<(), ConnectorError> {
        self.enqueue(Command::Inject(event))
    }

    /// Drop the session from the gateway side.
    pub fn hang_up(&self) -> Result<(), ConnectorError> {
        self.enqueue(Command::HangUp)
    }

    fn enqueue(&self, command: Command) -> Result<(), ConnectorError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ConnectorError::NotConnected);
        }
        match self.commands.lock().as_ref() {
            Some(tx) => tx.send(command).map_err(|_| ConnectorError::ConnectionClosed),
            None => Err(ConnectorError::NotConnected),
        }
    }
}

#[async_trait]
impl Connection for SimulatedGateway {
    async fn connect(&self, config: &ConnectorConfig) -> Result<(), ConnectorError> {
        let attempt = self.connect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.shared.config.refuse_connections {
            return Err(ConnectorError::Connect(format!(
                "{} refused connection (attempt {})",
                config.endpoint(),
                attempt
            )));
        }
        if self.connected.swap(true, Ordering::SeqCst) {
            return Err(ConnectorError::Connect("already connected".to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self.commands.lock() = Some(tx);
        *self.inbox.lock() = Some(rx);
        self.shutdown.send_replace(false);

        info!(
            endpoint = %config.endpoint(),
            client_id = config.client_id,
            environment = %config.environment,
            "Simulated gateway session opened"
        );
        Ok(())
    }

    fn run(&self, events: EventSender) -> Result<(), ConnectorError> {
        let inbox = self.inbox.lock().take().ok_or(ConnectorError::NotConnected)?;
        let shared = self.shared.clone();
        let shutdown_rx = self.shutdown.subscribe();
        tokio::spawn(serve(shared, inbox, events, shutdown_rx));
        Ok(())
    }

    fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.shutdown.send_replace(true);
            self.commands.lock().take();
            self.inbox.lock().take();
            info!("Simulated gateway session closed");
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl RequestIssuer for SimulatedGateway {
    fn request_next_id(&self) -> Result<(), ConnectorError> {
        if self.shared.config.refuse_id_requests {
            return Err(ConnectorError::Send("next id request dropped".to_string()));
        }
        self.enqueue(Command::NextId)
    }

    fn place_order(
        &self,
        order_id: RequestId,
        instrument: &InstrumentDescriptor,
        intent: &OrderIntent,
    ) -> Result<(), ConnectorError> {
        self.enqueue(Command::PlaceOrder(SubmittedOrder {
            order_id,
            instrument: instrument.clone(),
            intent: intent.clone(),
        }))
    }

    fn request_account_summary(
        &self,
        req_id: RequestId,
        account_group: &str,
        tags: &[&str],
    ) -> Result<(), ConnectorError> {
        debug!(req_id, account_group, tags = ?tags, "Account summary requested");
        self.enqueue(Command::AccountSummary {
            req_id,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        })
    }

    fn cancel_account_summary(&self, req_id: RequestId) -> Result<(), ConnectorError> {
        self.enqueue(Command::CancelAccountSummary(req_id))
    }

    fn request_positions(&self) -> Result<(), ConnectorError> {
        self.enqueue(Command::Positions)
    }

    fn cancel_positions(&self) -> Result<(), ConnectorError> {
        self.enqueue(Command::CancelPositions)
    }
}

/// Receive loop: handshake, then one batch of callbacks per request.
async fn serve(
    shared: Arc<Shared>,
    mut inbox: mpsc::UnboundedReceiver<Command>,
    events: EventSender,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut handshake = Vec::new();
    if shared.config.announce_on_connect {
        handshake.push(GatewayEvent::NextValidId(shared.state.lock().next_order_id));
    }
    handshake.extend(
        shared
            .config
            .connect_notifications
            .iter()
            .map(|(code, message)| GatewayEvent::Error {
                req_id: NOTIFICATION_REQUEST_ID,
                code: *code,
                message: message.clone(),
            }),
    );
    if !emit(&events, handshake).await {
        return;
    }

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    debug!("Simulated receive loop stopping");
                    return;
                }
            }

            command = inbox.recv() => {
                let Some(command) = command else {
                    return;
                };
                if matches!(command, Command::HangUp) {
                    warn!("Simulated gateway hung up");
                    return;
                }
                let batch = handle(&shared, command);
                if !emit(&events, batch).await {
                    return;
                }
            }
        }
    }
}

/// Send a batch in order. Returns false once the consumer is gone.
async fn emit(events: &EventSender, batch: Vec<GatewayEvent>) -> bool {
    for event in batch {
        if events.send(event).await.is_err() {
            debug!("Event receiver dropped, stopping simulated gateway");
            return false;
        }
    }
    true
}

fn handle(shared: &Shared, command: Command) -> Vec<GatewayEvent> {
    let config = &shared.config;
    let mut state = shared.state.lock();

    match command {
        Command::NextId => vec![GatewayEvent::NextValidId(state.next_order_id)],
        Command::PlaceOrder(order) => {
            let order_id = order.order_id;
            if order_id < state.next_order_id {
                state.submitted.push(order);
                return vec![GatewayEvent::Error {
                    req_id: order_id,
                    code: DUPLICATE_ORDER_ID,
                    message: "Duplicate order id".to_string(),
                }];
            }
            state.next_order_id = order_id + 1;

            let rejected = config
                .rejected_symbols
                .iter()
                .any(|s| s.eq_ignore_ascii_case(&order.instrument.symbol));
            let symbol = order.instrument.symbol.clone();
            state.submitted.push(order);

            if rejected {
                vec![GatewayEvent::Error {
                    req_id: order_id,
                    code: ORDER_REJECTED,
                    message: format!("Order rejected - reason: {} is not tradable", symbol),
                }]
            } else {
                Vec::new()
            }
        }
        Command::AccountSummary { req_id, tags } => {
            if !config.answer_account_summary {
                return Vec::new();
            }
            let mut batch: Vec<GatewayEvent> = config
                .accounts
                .iter()
                .filter(|_| tags.iter().any(|t| t == AVAILABLE_FUNDS_TAG))
                .map(|account| GatewayEvent::AccountSummary {
                    req_id,
                    account: account.name.clone(),
                    tag: AVAILABLE_FUNDS_TAG.to_string(),
                    value: account.available_funds.to_string(),
                    currency: account.currency.clone(),
                })
                .collect();
            batch.push(GatewayEvent::AccountSummaryEnd { req_id });
            batch
        }
        Command::CancelAccountSummary(req_id) => {
            state.cancelled_summaries.push(req_id);
            Vec::new()
        }
        Command::Positions => {
            state.positions_subscribed = true;
            let mut batch: Vec<GatewayEvent> = config
                .positions
                .iter()
                .cloned()
                .map(GatewayEvent::Position)
                .collect();
            batch.push(GatewayEvent::PositionEnd);
            batch
        }
        Command::CancelPositions => {
            state.positions_subscribed = false;
            Vec::new()
        }
        Command::Inject(event) => vec![event],
        Command::HangUp => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connector_core::create_event_channel;
    use model::{OrderAction, SecurityType};
    use rust_decimal_macros::dec;

    fn equity(symbol: &str) -> InstrumentDescriptor {
        InstrumentDescriptor {
            symbol: symbol.into(),
            security_type: SecurityType::Equity,
            currency: "USD".into(),
            venue: "SMART".into(),
            primary_venue: Some("ISLAND".into()),
        }
    }

    async fn started(config: SimConfig) -> (SimulatedGateway, connector_core::EventReceiver) {
        let gateway = SimulatedGateway::new(config);
        gateway.connect(&ConnectorConfig::default()).await.unwrap();
        let (tx, rx) = create_event_channel(64);
        gateway.run(tx).unwrap();
        (gateway, rx)
    }

    #[tokio::test]
    async fn test_handshake_announces_id_then_notifications() {
        let (_gateway, mut rx) = started(SimConfig {
            first_order_id: 42,
            ..Default::default()
        })
        .await;

        assert_eq!(rx.recv().await, Some(GatewayEvent::NextValidId(42)));
        assert!(matches!(
            rx.recv().await,
            Some(GatewayEvent::Error { req_id: NOTIFICATION_REQUEST_ID, code: 2104, .. })
        ));
    }

    #[tokio::test]
    async fn test_order_advances_next_id_and_rejects_configured_symbols() {
        let (gateway, mut rx) = started(SimConfig {
            connect_notifications: Vec::new(),
            rejected_symbols: vec!["XYZ".into()],
            ..Default::default()
        })
        .await;
        assert_eq!(rx.recv().await, Some(GatewayEvent::NextValidId(1)));

        let intent = OrderIntent::market(OrderAction::Buy, dec!(10));
        gateway.place_order(1, &equity("AAPL"), &intent).unwrap();
        gateway.place_order(2, &equity("XYZ"), &intent).unwrap();
        gateway.request_next_id().unwrap();

        assert!(matches!(
            rx.recv().await,
            Some(GatewayEvent::Error { req_id: 2, code: ORDER_REJECTED, .. })
        ));
        assert_eq!(rx.recv().await, Some(GatewayEvent::NextValidId(3)));
        assert_eq!(gateway.submitted_orders().len(), 2);
    }

    #[tokio::test]
    async fn test_account_summary_rows_then_end() {
        let (gateway, mut rx) = started(SimConfig {
            connect_notifications: Vec::new(),
            ..Default::default()
        })
        .await;
        rx.recv().await;

        gateway
            .request_account_summary(7, "All", &[AVAILABLE_FUNDS_TAG])
            .unwrap();

        match rx.recv().await {
            Some(GatewayEvent::AccountSummary { req_id, tag, value, .. }) => {
                assert_eq!(req_id, 7);
                assert_eq!(tag, AVAILABLE_FUNDS_TAG);
                assert_eq!(value, "100000");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(rx.recv().await, Some(GatewayEvent::AccountSummaryEnd { req_id: 7 }));
    }

    #[tokio::test]
    async fn test_disconnect_closes_event_channel() {
        let (gateway, mut rx) = started(SimConfig::default()).await;

        gateway.disconnect();
        gateway.disconnect();

        while rx.recv().await.is_some() {}
        assert!(!gateway.is_connected());
        assert!(matches!(
            gateway.request_next_id(),
            Err(ConnectorError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_refused_connections() {
        let gateway = SimulatedGateway::new(SimConfig {
            refuse_connections: 1,
            ..Default::default()
        });
        let config = ConnectorConfig::default();

        assert!(gateway.connect(&config).await.is_err());
        assert!(gateway.connect(&config).await.is_ok());
        assert_eq!(gateway.connect_attempts(), 2);
    }
}
