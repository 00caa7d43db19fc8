use serde::{Deserialize, Serialize};

/// Asset class of an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecurityType {
    Equity,
    ForeignExchangePair,
}

impl SecurityType {
    /// Gateway string representation.
    pub fn as_gateway_str(&self) -> &'static str {
        match self {
            Self::Equity => "STK",
            Self::ForeignExchangePair => "CASH",
        }
    }
}

/// Fully specified instrument, ready to be sent with an order.
///
/// For FX pairs `symbol` is the base currency and `currency` the quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentDescriptor {
    pub symbol: String,
    pub security_type: SecurityType,
    pub currency: String,
    pub venue: String,
    pub primary_venue: Option<String>,
}
