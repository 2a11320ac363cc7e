//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the rally-point matchmaking
//! service: session and match lifecycle counters plus live gauges for the
//! queue and registry.

use anyhow::Result;
use prometheus::{IntCounter, IntGauge, Registry};
use std::sync::Arc;

/// Main metrics collector for the matchmaking service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Total sessions connected
    pub sessions_connected_total: IntCounter,

    /// Total sessions removed by the expiry sweep
    pub sessions_expired_total: IntCounter,

    /// Total matches committed by the matchmaker
    pub matches_created_total: IntCounter,

    /// Total matches ended by the end-of-match signal
    pub matches_ended_total: IntCounter,

    /// Total server allocation failures
    pub provisioning_failures_total: IntCounter,

    /// Total matchmaking scans run
    pub pairing_ticks_total: IntCounter,

    /// Total matchmaking scans that failed
    pub tick_failures_total: IntCounter,

    /// Current number of known sessions
    pub active_sessions: IntGauge,

    /// Current number of sessions waiting in the queue
    pub queue_depth: IntGauge,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let sessions_connected_total = IntCounter::new(
            "rally_point_sessions_connected_total",
            "Total sessions connected",
        )?;
        registry.register(Box::new(sessions_connected_total.clone()))?;

        let sessions_expired_total = IntCounter::new(
            "rally_point_sessions_expired_total",
            "Total sessions removed by the expiry sweep",
        )?;
        registry.register(Box::new(sessions_expired_total.clone()))?;

        let matches_created_total = IntCounter::new(
            "rally_point_matches_created_total",
            "Total matches committed by the matchmaker",
        )?;
        registry.register(Box::new(matches_created_total.clone()))?;

        let matches_ended_total = IntCounter::new(
            "rally_point_matches_ended_total",
            "Total matches ended",
        )?;
        registry.register(Box::new(matches_ended_total.clone()))?;

        let provisioning_failures_total = IntCounter::new(
            "rally_point_provisioning_failures_total",
            "Total server allocation failures",
        )?;
        registry.register(Box::new(provisioning_failures_total.clone()))?;

        let pairing_ticks_total = IntCounter::new(
            "rally_point_pairing_ticks_total",
            "Total matchmaking scans run",
        )?;
        registry.register(Box::new(pairing_ticks_total.clone()))?;

        let tick_failures_total = IntCounter::new(
            "rally_point_tick_failures_total",
            "Total matchmaking scans that failed",
        )?;
        registry.register(Box::new(tick_failures_total.clone()))?;

        let active_sessions = IntGauge::new(
            "rally_point_active_sessions",
            "Current number of known sessions",
        )?;
        registry.register(Box::new(active_sessions.clone()))?;

        let queue_depth = IntGauge::new(
            "rally_point_queue_depth",
            "Current number of sessions waiting in the queue",
        )?;
        registry.register(Box::new(queue_depth.clone()))?;

        Ok(Self {
            registry,
            sessions_connected_total,
            sessions_expired_total,
            matches_created_total,
            matches_ended_total,
            provisioning_failures_total,
            pairing_ticks_total,
            tick_failures_total,
            active_sessions,
            queue_depth,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_registers_metrics() {
        let collector = MetricsCollector::new().unwrap();
        collector.sessions_connected_total.inc();
        collector.queue_depth.set(3);

        let families = collector.registry().gather();
        assert!(!families.is_empty());

        let names: Vec<String> = families
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names
            .iter()
            .any(|name| name == "rally_point_sessions_connected_total"));
        assert!(names.iter().any(|name| name == "rally_point_queue_depth"));
    }

    #[test]
    fn test_fresh_registries_are_independent() {
        let first = MetricsCollector::new().unwrap();
        let second = MetricsCollector::new().unwrap();

        first.matches_created_total.inc();
        assert_eq!(first.matches_created_total.get(), 1);
        assert_eq!(second.matches_created_total.get(), 0);
    }
}
