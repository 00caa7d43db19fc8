//! Transport seam between the client and a trading gateway.
//!
//! A gateway is anything that can open a session ([`Connection`]), accept
//! outbound requests ([`RequestIssuer`]) and push decoded inbound callbacks
//! onto an [`EventSender`] from its own receive loop.

use async_trait::async_trait;
use common::GatewayEnvironment;
use model::{GatewayEvent, InstrumentDescriptor, OrderIntent, RequestId};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Connection closed")]
    ConnectionClosed,
}

#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Gateway host.
    pub host: String,
    /// Gateway API port.
    pub port: u16,
    /// Client id presented at handshake. Must be unique per gateway session.
    pub client_id: i32,
    /// Inbound event channel capacity.
    pub channel_capacity: usize,
    /// Which gateway flavour this points at.
    pub environment: GatewayEnvironment,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        let environment = GatewayEnvironment::default();
        Self {
            host: "127.0.0.1".to_string(),
            port: environment.default_port(),
            client_id: 999,
            channel_capacity: 1024,
            environment,
        }
    }
}

impl ConnectorConfig {
    /// Build from `GATEWAY_ENVIRONMENT`, `GATEWAY_HOST`, `GATEWAY_PORT` and
    /// `GATEWAY_CLIENT_ID`. Unset or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        let environment = GatewayEnvironment::from_env();
        let defaults = Self::default();

        Self {
            host: std::env::var("GATEWAY_HOST").unwrap_or(defaults.host),
            port: std::env::var("GATEWAY_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or_else(|| environment.default_port()),
            client_id: std::env::var("GATEWAY_CLIENT_ID")
                .ok()
                .and_then(|id| id.parse().ok())
                .unwrap_or(defaults.client_id),
            channel_capacity: defaults.channel_capacity,
            environment,
        }
    }

    /// `host:port` for logging.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub type EventSender = mpsc::Sender<GatewayEvent>;
pub type EventReceiver = mpsc::Receiver<GatewayEvent>;

pub fn create_event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    mpsc::channel(capacity)
}

/// Session lifecycle of a gateway transport.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Open the session and complete the transport handshake.
    async fn connect(&self, config: &ConnectorConfig) -> Result<(), ConnectorError>;

    /// Start the receive loop on its own task. Decoded callbacks are pushed
    /// onto `events` in arrival order; the sender is dropped when the session
    /// ends, which is how the consumer learns the connection is gone.
    fn run(&self, events: EventSender) -> Result<(), ConnectorError>;

    /// Close the session. Safe to call more than once.
    fn disconnect(&self);

    fn is_connected(&self) -> bool;
}

/// Outbound requests. Each call only enqueues the request; answers arrive as
/// [`GatewayEvent`]s.
pub trait RequestIssuer: Send + Sync {
    /// Ask the gateway to announce its next valid order id.
    fn request_next_id(&self) -> Result<(), ConnectorError>;

    fn place_order(
        &self,
        order_id: RequestId,
        instrument: &InstrumentDescriptor,
        intent: &OrderIntent,
    ) -> Result<(), ConnectorError>;

    fn request_account_summary(
        &self,
        req_id: RequestId,
        account_group: &str,
        tags: &[&str],
    ) -> Result<(), ConnectorError>;

    /// Stop the periodic updates the gateway sends after a summary completes.
    fn cancel_account_summary(&self, req_id: RequestId) -> Result<(), ConnectorError>;

    /// Subscribe to position rows for all accounts.
    fn request_positions(&self) -> Result<(), ConnectorError>;

    fn cancel_positions(&self) -> Result<(), ConnectorError>;
}

/// A full gateway transport.
pub trait Gateway: Connection + RequestIssuer {}

impl<T: Connection + RequestIssuer + ?Sized> Gateway for T {}
