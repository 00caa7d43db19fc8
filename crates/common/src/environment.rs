//! Gateway environment selection.
//!
//! The trading gateway ships as two desktop applications (the full trader
//! workstation and the headless gateway), each listening on a different port
//! for paper and live sessions.

use std::fmt;
use std::str::FromStr;

/// Which gateway process and account type to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GatewayEnvironment {
    /// Trader workstation, paper account.
    #[default]
    PaperTws,
    /// Trader workstation, live account (real money).
    LiveTws,
    /// Headless gateway, paper account.
    PaperGateway,
    /// Headless gateway, live account (real money).
    LiveGateway,
}

impl GatewayEnvironment {
    /// Default API port the gateway listens on.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::PaperTws => 7497,
            Self::LiveTws => 7496,
            Self::PaperGateway => 4002,
            Self::LiveGateway => 4001,
        }
    }

    /// Returns true if orders placed here move real money.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::LiveTws | Self::LiveGateway)
    }

    /// Load environment from `GATEWAY_ENVIRONMENT` env var.
    ///
    /// Returns `PaperTws` if not set or invalid.
    pub fn from_env() -> Self {
        std::env::var("GATEWAY_ENVIRONMENT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }
}

impl fmt::Display for GatewayEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PaperTws => write!(f, "paper-tws"),
            Self::LiveTws => write!(f, "live-tws"),
            Self::PaperGateway => write!(f, "paper-gateway"),
            Self::LiveGateway => write!(f, "live-gateway"),
        }
    }
}

impl FromStr for GatewayEnvironment {
    type Err = ParseEnvironmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "paper-tws" | "paper" | "tws-paper" => Ok(Self::PaperTws),
            "live-tws" | "live" | "tws-live" => Ok(Self::LiveTws),
            "paper-gateway" | "gateway-paper" => Ok(Self::PaperGateway),
            "live-gateway" | "gateway-live" => Ok(Self::LiveGateway),
            _ => Err(ParseEnvironmentError(s.to_string())),
        }
    }
}

/// Error parsing environment string.
#[derive(Debug, Clone)]
pub struct ParseEnvironmentError(String);

impl fmt::Display for ParseEnvironmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid gateway environment '{}', expected one of paper-tws, live-tws, paper-gateway, live-gateway",
            self.0
        )
    }
}

impl std::error::Error for ParseEnvironmentError {}
