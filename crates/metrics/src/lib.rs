use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Thread-safe activity counters for the gateway client.
#[derive(Debug)]
pub struct ClientMetrics {
    // Counters
    events_received: AtomicU64,
    requests_issued: AtomicU64,
    requests_resolved: AtomicU64,
    requests_failed: AtomicU64,
    requests_timed_out: AtomicU64,
    gateway_errors: AtomicU64,
    notifications: AtomicU64,
    protocol_anomalies: AtomicU64,
    position_rows: AtomicU64,

    // Timestamps
    inner: RwLock<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    start_time: Instant,
    last_event_time: Option<Instant>,
    last_error_time: Option<Instant>,
}

impl Default for ClientMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientMetrics {
    pub fn new() -> Self {
        Self {
            events_received: AtomicU64::new(0),
            requests_issued: AtomicU64::new(0),
            requests_resolved: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            requests_timed_out: AtomicU64::new(0),
            gateway_errors: AtomicU64::new(0),
            notifications: AtomicU64::new(0),
            protocol_anomalies: AtomicU64::new(0),
            position_rows: AtomicU64::new(0),
            inner: RwLock::new(MetricsInner {
                start_time: Instant::now(),
                last_event_time: None,
                last_error_time: None,
            }),
        }
    }

    // --- Increment methods ---

    pub fn inc_events_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_event_time = Some(Instant::now());
    }

    pub fn inc_requests_issued(&self) {
        self.requests_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_requests_resolved(&self) {
        self.requests_resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_requests_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_requests_timed_out(&self) {
        self.requests_timed_out.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_error_time = Some(Instant::now());
    }

    pub fn inc_gateway_errors(&self) {
        self.gateway_errors.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_error_time = Some(Instant::now());
    }

    pub fn inc_notifications(&self) {
        self.notifications.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_protocol_anomalies(&self) {
        self.protocol_anomalies.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_error_time = Some(Instant::now());
    }

    pub fn inc_position_rows(&self) {
        self.position_rows.fetch_add(1, Ordering::Relaxed);
    }

    // --- Getter methods ---

    pub fn events_received(&self) -> u64 {
        self.events_received.load(Ordering::Relaxed)
    }

    pub fn requests_issued(&self) -> u64 {
        self.requests_issued.load(Ordering::Relaxed)
    }

    pub fn requests_resolved(&self) -> u64 {
        self.requests_resolved.load(Ordering::Relaxed)
    }

    pub fn requests_failed(&self) -> u64 {
        self.requests_failed.load(Ordering::Relaxed)
    }

    pub fn requests_timed_out(&self) -> u64 {
        self.requests_timed_out.load(Ordering::Relaxed)
    }

    pub fn gateway_errors(&self) -> u64 {
        self.gateway_errors.load(Ordering::Relaxed)
    }

    pub fn notifications(&self) -> u64 {
        self.notifications.load(Ordering::Relaxed)
    }

    pub fn protocol_anomalies(&self) -> u64 {
        self.protocol_anomalies.load(Ordering::Relaxed)
    }

    pub fn position_rows(&self) -> u64 {
        self.position_rows.load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> f64 {
        self.inner.read().start_time.elapsed().as_secs_f64()
    }

    pub fn secs_since_last_event(&self) -> Option<f64> {
        self.inner
            .read()
            .last_event_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    pub fn secs_since_last_error(&self) -> Option<f64> {
        self.inner
            .read()
            .last_error_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    /// Generate a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_received: self.events_received(),
            requests_issued: self.requests_issued(),
            requests_resolved: self.requests_resolved(),
            requests_failed: self.requests_failed(),
            requests_timed_out: self.requests_timed_out(),
            gateway_errors: self.gateway_errors(),
            notifications: self.notifications(),
            protocol_anomalies: self.protocol_anomalies(),
            position_rows: self.position_rows(),
            uptime_secs: self.uptime_secs(),
            secs_since_last_event: self.secs_since_last_event(),
            secs_since_last_error: self.secs_since_last_error(),
        }
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub events_received: u64,
    pub requests_issued: u64,
    pub requests_resolved: u64,
    pub requests_failed: u64,
    pub requests_timed_out: u64,
    pub gateway_errors: u64,
    pub notifications: u64,
    pub protocol_anomalies: u64,
    pub position_rows: u64,
    pub uptime_secs: f64,
    pub secs_since_last_event: Option<f64>,
    pub secs_since_last_error: Option<f64>,
}

/// Health status of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Requests are being answered.
    Healthy,
    /// Some requests timed out or the gateway sent unexpected callbacks.
    Degraded,
    /// Most requests are timing out.
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "HEALTHY"),
            HealthStatus::Degraded => write!(f, "DEGRADED"),
            HealthStatus::Unhealthy => write!(f, "UNHEALTHY"),
        }
    }
}

impl MetricsSnapshot {
    /// Share of timed-out requests above which the client is unhealthy.
    const UNHEALTHY_TIMEOUT_RATIO: f64 = 0.5;

    /// Determine the health status based on metrics.
    pub fn health_status(&self) -> HealthStatus {
        if self.requests_issued > 0 {
            let ratio = self.requests_timed_out as f64 / self.requests_issued as f64;
            if ratio > Self::UNHEALTHY_TIMEOUT_RATIO {
                return HealthStatus::Unhealthy;
            }
        }

        if self.requests_timed_out > 0 || self.protocol_anomalies > 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Client Metrics ===")?;
        writeln!(f, "Uptime:              {:.1}s", self.uptime_secs)?;
        writeln!(f, "Events received:     {}", self.events_received)?;
        writeln!(f, "Requests issued:     {}", self.requests_issued)?;
        writeln!(f, "Requests resolved:   {}", self.requests_resolved)?;
        writeln!(f, "Requests failed:     {}", self.requests_failed)?;
        writeln!(f, "Requests timed out:  {}", self.requests_timed_out)?;
        writeln!(f, "Gateway errors:      {}", self.gateway_errors)?;
        writeln!(f, "Notifications:       {}", self.notifications)?;
        writeln!(f, "Protocol anomalies:  {}", self.protocol_anomalies)?;
        writeln!(f, "Position rows:       {}", self.position_rows)?;
        if let Some(secs) = self.secs_since_last_event {
            writeln!(f, "Since last event:    {:.1}s", secs)?;
        }
        if let Some(secs) = self.secs_since_last_error {
            writeln!(f, "Since last error:    {:.1}s", secs)?;
        }
        Ok(())
    }
}

/// Shared handle to metrics.
pub type SharedMetrics = Arc<ClientMetrics>;

pub fn create_metrics() -> SharedMetrics {
    Arc::new(ClientMetrics::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_increment() {
        let metrics = ClientMetrics::new();

        metrics.inc_requests_issued();
        metrics.inc_requests_issued();
        metrics.inc_requests_resolved();
        metrics.inc_notifications();

        assert_eq!(metrics.requests_issued(), 2);
        assert_eq!(metrics.requests_resolved(), 1);
        assert_eq!(metrics.notifications(), 1);
    }

    #[test]
    fn test_metrics_snapshot() {
        let metrics = ClientMetrics::new();

        metrics.inc_events_received();
        metrics.inc_gateway_errors();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.events_received, 1);
        assert_eq!(snapshot.gateway_errors, 1);
        assert!(snapshot.uptime_secs >= 0.0);
        assert!(snapshot.secs_since_last_error.is_some());
    }

    #[test]
    fn test_last_event_time() {
        let metrics = ClientMetrics::new();

        assert!(metrics.secs_since_last_event().is_none());

        metrics.inc_events_received();

        let secs = metrics.secs_since_last_event();
        assert!(secs.is_some());
        assert!(secs.unwrap() < 1.0);
    }

    #[test]
    fn test_health_status_healthy_when_idle() {
        assert_eq!(MetricsSnapshot::default().health_status(), HealthStatus::Healthy);
    }

    #[test]
    fn test_health_status_degraded_on_anomaly() {
        let snapshot = MetricsSnapshot {
            requests_issued: 10,
            requests_resolved: 10,
            protocol_anomalies: 1,
            ..Default::default()
        };

        assert_eq!(snapshot.health_status(), HealthStatus::Degraded);
    }

    #[test]
    fn test_health_status_degraded_on_few_timeouts() {
        let snapshot = MetricsSnapshot {
            requests_issued: 10,
            requests_resolved: 9,
            requests_timed_out: 1,
            ..Default::default()
        };

        assert_eq!(snapshot.health_status(), HealthStatus::Degraded);
    }

    #[test]
    fn test_health_status_boundary_at_half_timed_out() {
        // Exactly half is not above the ratio
        let snapshot = MetricsSnapshot {
            requests_issued: 4,
            requests_timed_out: 2,
            ..Default::default()
        };

        assert_eq!(snapshot.health_status(), HealthStatus::Degraded);
    }

    #[test]
    fn test_health_status_unhealthy_when_most_time_out() {
        let snapshot = MetricsSnapshot {
            requests_issued: 4,
            requests_timed_out: 3,
            ..Default::default()
        };

        assert_eq!(snapshot.health_status(), HealthStatus::Unhealthy);
    }
}
