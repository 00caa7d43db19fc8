//! Request correlation and order preparation.
//!
//! - **Order ids**: [`OrderIdAllocator`] hands out request/order ids seeded by
//!   the gateway's next-valid-id announcement
//! - **Correlation table**: [`CorrelationTable`] parks one waiter per in-flight
//!   request until the receive path resolves or fails it
//! - **Classifier**: [`classify`] turns a typed instrument string into an
//!   [`model::InstrumentDescriptor`]
//!
//! # Request Lifecycle
//!
//! 1. Caller allocates an id from `OrderIdAllocator`
//! 2. Caller registers a waiter in `CorrelationTable` under that id
//! 3. Request is sent to the gateway
//! 4. The dispatcher decodes the correlated callback and resolves or fails the
//!    entry, waking exactly that caller
//! 5. The caller's deadline, or a disconnect, ends the wait otherwise

mod classifier;
mod correlation;
mod order_id;

pub use classifier::{
    classify, ClassifyError, DEFAULT_PRIMARY_VENUE, DOMESTIC_CURRENCY, FX_VENUE, SMART_VENUE,
};
pub use correlation::{
    create_correlation_table, CorrelationTable, PendingKind, RegisterError, RequestFailure,
    Resolution, SharedCorrelationTable, Waiter,
};
pub use order_id::{AllocatorError, OrderIdAllocator};
