//! Shared plumbing for the gateway client crates.

mod backoff;
mod environment;

pub use backoff::ExponentialBackoff;
pub use environment::{GatewayEnvironment, ParseEnvironmentError};

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// Honors `RUST_LOG`, falling back to `info`. Calling this twice is harmless;
/// the second installation attempt is ignored.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
