//! In-process simulated gateway.
//!
//! Speaks the same request/callback contract as a real gateway session:
//! announces a next valid id at handshake, answers account-summary and
//! position requests, advances its id counter on every order and rejects
//! configured symbols. Used for dry runs and tests; nothing leaves the
//! process.

mod config;
mod gateway;

pub use config::{SimAccount, SimConfig};
pub use gateway::{SimulatedGateway, SubmittedOrder};
