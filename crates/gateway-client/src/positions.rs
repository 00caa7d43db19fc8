use std::sync::Arc;

use model::PositionRow;

/// One item of the position stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionUpdate {
    Row(PositionRow),
    /// The gateway has sent the initial set of positions.
    End,
}

/// Sink for position updates, called on the dispatcher task in delivery
/// order. Must not block.
pub type PositionCallback = Arc<dyn Fn(PositionUpdate) + Send + Sync>;
