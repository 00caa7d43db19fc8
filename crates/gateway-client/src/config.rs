use std::time::Duration;

use connector_core::ConnectorConfig;

/// Configuration for [`GatewayClient`](crate::GatewayClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Transport settings.
    pub connector: ConnectorConfig,
    /// Deadline for any single correlated request.
    pub request_timeout: Duration,
    /// Deadline for the first next-valid-id after connecting.
    pub handshake_timeout: Duration,
    /// Connection attempts before giving up (at least one is always made).
    pub connect_attempts: u32,
    /// First delay between connection attempts; doubles per attempt.
    pub connect_backoff: Duration,
    /// Account group for summary requests.
    pub account_group: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connector: ConnectorConfig::default(),
            request_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(5),
            connect_attempts: 3,
            connect_backoff: Duration::from_millis(500),
            account_group: "All".to_string(),
        }
    }
}

impl ClientConfig {
    /// Transport settings from the environment, plus
    /// `GATEWAY_REQUEST_TIMEOUT_MS` if set.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            connector: ConnectorConfig::from_env(),
            request_timeout: std::env::var("GATEWAY_REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|ms| ms.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.connect_attempts, 3);
        assert_eq!(config.account_group, "All");
        assert_eq!(config.connector.client_id, 999);
    }
}
