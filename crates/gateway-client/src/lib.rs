//! Client for a trading gateway that answers requests out of band.
//!
//! The gateway pushes every answer as an asynchronous callback. This crate
//! turns those callbacks back into plain `async` calls:
//!
//! - **GatewayClient**: the public facade (`place_order`,
//!   `get_available_funds`, position streaming, `shutdown`)
//! - **Dispatcher**: the single consumer of inbound callbacks, resolving the
//!   matching waiter or updating shared state
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐ allocate id  ┌──────────────────┐
//! │ GatewayClient │─────────────>│ OrderIdAllocator │<──────────┐
//! │               │ register     ├──────────────────┤           │
//! │               │─────────────>│ CorrelationTable │<──┐       │
//! └───────┬───────┘              └──────────────────┘   │       │
//!         │ RequestIssuer                    resolve/fail│ seed  │
//!         v                                             │       │
//! ┌───────────────┐   GatewayEvent   ┌────────────────────────────┐
//! │    Gateway    │─────────────────>│ Dispatcher -> EventSink    │
//! └───────────────┘   (mpsc)         └────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use gateway_client::{ClientConfig, GatewayClient};
//! use model::OrderAction;
//! use rust_decimal_macros::dec;
//!
//! let client = GatewayClient::connect(gateway, ClientConfig::from_env()).await?;
//! let funds = client.get_available_funds().await?;
//! let accepted = client.place_order("AAPL", OrderAction::Buy, dec!(10)).await?;
//! client.shutdown();
//! ```

mod client;
mod config;
mod dispatcher;
mod error;
mod positions;

pub use client::{GatewayClient, OrderAcceptance};
pub use config::ClientConfig;
pub use dispatcher::{dispatch, run_dispatcher, EventSink};
pub use error::ClientError;
pub use positions::{PositionCallback, PositionUpdate};
