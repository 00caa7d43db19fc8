use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderAction {
    Buy,
    Sell,
}

impl OrderAction {
    /// Gateway string representation.
    pub fn as_gateway_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_gateway_str())
    }
}

impl FromStr for OrderAction {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BUY" => Ok(Self::Buy),
            "SELL" => Ok(Self::Sell),
            _ => Err(ParseActionError(s.to_string())),
        }
    }
}

/// Error parsing an order action.
#[derive(Debug, Clone)]
pub struct ParseActionError(String);

impl fmt::Display for ParseActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid order action '{}', expected BUY or SELL", self.0)
    }
}

impl std::error::Error for ParseActionError {}

/// Order type. Only market orders are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderStyle {
    #[default]
    Market,
}

impl OrderStyle {
    /// Gateway string representation.
    pub fn as_gateway_str(&self) -> &'static str {
        match self {
            Self::Market => "MKT",
        }
    }
}

/// What the caller wants done with an instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub action: OrderAction,
    pub quantity: Decimal,
    pub style: OrderStyle,
}

impl OrderIntent {
    /// Build a market order intent.
    pub fn market(action: OrderAction, quantity: Decimal) -> Self {
        Self {
            action,
            quantity,
            style: OrderStyle::Market,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_action_parse_is_case_insensitive() {
        assert_eq!("buy".parse::<OrderAction>().unwrap(), OrderAction::Buy);
        assert_eq!("Sell".parse::<OrderAction>().unwrap(), OrderAction::Sell);
        assert!("hold".parse::<OrderAction>().is_err());
    }

    #[test]
    fn test_market_intent() {
        let intent = OrderIntent::market(OrderAction::Buy, dec!(10));
        assert_eq!(intent.style, OrderStyle::Market);
        assert_eq!(intent.style.as_gateway_str(), "MKT");
        assert_eq!(intent.action.to_string(), "BUY");
    }
}
