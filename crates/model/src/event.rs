use serde::{Deserialize, Serialize};

use crate::{PositionRow, RequestId};

/// Decoded inbound callback from the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayEvent {
    /// Next order id the gateway will accept.
    NextValidId(RequestId),
    /// One tag/value row of an account summary.
    AccountSummary {
        req_id: RequestId,
        account: String,
        tag: String,
        value: String,
        currency: String,
    },
    /// All rows for an account summary request have been sent.
    AccountSummaryEnd { req_id: RequestId },
    /// Error or notification. `req_id` is the notification sentinel when the
    /// message belongs to no request.
    Error {
        req_id: RequestId,
        code: i32,
        message: String,
    },
    Position(PositionRow),
    PositionEnd,
}

impl GatewayEvent {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NextValidId(_) => "next_valid_id",
            Self::AccountSummary { .. } => "account_summary",
            Self::AccountSummaryEnd { .. } => "account_summary_end",
            Self::Error { .. } => "error",
            Self::Position(_) => "position",
            Self::PositionEnd => "position_end",
        }
    }
}
