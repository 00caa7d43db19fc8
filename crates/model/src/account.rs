use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account-summary tag carrying the funds available for trading.
pub const AVAILABLE_FUNDS_TAG: &str = "AvailableFunds";

/// Available funds as last reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Account the value was reported for.
    pub account: String,
    pub available_funds: Decimal,
    pub currency: String,
}

/// One row of the position stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRow {
    pub account: String,
    pub symbol: String,
    /// Raw gateway security type; positions may hold asset classes the
    /// order path never places.
    pub security_type: String,
    pub currency: Option<String>,
    pub position: Decimal,
    pub average_cost: Decimal,
}
