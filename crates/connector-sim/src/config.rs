use model::{PositionRow, RequestId};
use rust_decimal::Decimal;

/// A paper account held by the simulated gateway.
#[derive(Debug, Clone)]
pub struct SimAccount {
    pub name: String,
    pub available_funds: Decimal,
    pub currency: String,
}

impl SimAccount {
    pub fn new(name: impl Into<String>, available_funds: Decimal) -> Self {
        Self {
            name: name.into(),
            available_funds,
            currency: "USD".to_string(),
        }
    }
}

/// Behaviour of the simulated gateway.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Next valid id announced at handshake.
    pub first_order_id: RequestId,
    /// Whether the handshake announcement is sent at all.
    pub announce_on_connect: bool,
    pub accounts: Vec<SimAccount>,
    pub positions: Vec<PositionRow>,
    /// Symbols whose orders are rejected with code 201.
    pub rejected_symbols: Vec<String>,
    /// When false, account-summary requests are swallowed.
    pub answer_account_summary: bool,
    /// Notifications (code, message) sent right after the handshake.
    pub connect_notifications: Vec<(i32, String)>,
    /// Number of initial connection attempts refused.
    pub refuse_connections: u32,
    /// When true, explicit next-id requests fail at the transport.
    pub refuse_id_requests: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            first_order_id: 1,
            announce_on_connect: true,
            accounts: vec![SimAccount::new("DU0000001", Decimal::from(100_000))],
            positions: Vec::new(),
            rejected_symbols: Vec::new(),
            answer_account_summary: true,
            connect_notifications: vec![
                (2104, "Market data farm connection is OK:usfarm".to_string()),
                (2106, "HMDS data farm connection is OK:ushmds".to_string()),
            ],
            refuse_connections: 0,
            refuse_id_requests: false,
        }
    }
}
