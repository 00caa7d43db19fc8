//! Domain types shared by the gateway client crates.

mod account;
mod event;
mod instrument;
mod order;

pub use account::{AccountSnapshot, PositionRow, AVAILABLE_FUNDS_TAG};
pub use event::GatewayEvent;
pub use instrument::{InstrumentDescriptor, SecurityType};
pub use order::{OrderAction, OrderIntent, OrderStyle, ParseActionError};

/// Identifier attached to an outbound request (orders and account summaries
/// share one id space).
pub type RequestId = i64;

/// Request id the gateway uses for notifications that belong to no request.
pub const NOTIFICATION_REQUEST_ID: RequestId = -1;
