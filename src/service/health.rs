//! Health check reporting
//!
//! This module derives liveness and readiness information from the engine's
//! statistics. The HTTP layer serves these reports; `main` can also print
//! one for a command-line health check.

use crate::error::Result;
use crate::matchmaker::{EngineStats, MatchEngine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Crate version
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Engine statistics
    pub stats: EngineStats,
}

/// Health check entry points
pub struct HealthCheck;

impl HealthCheck {
    /// Build a full health report from the engine's current statistics.
    pub fn check(engine: &Arc<MatchEngine>, service_name: &str) -> Result<HealthReport> {
        let (status, stats) = match engine.get_stats() {
            Ok(stats) => (HealthStatus::Healthy, stats),
            Err(e) => {
                error!("Health check could not read engine stats: {}", e);
                (HealthStatus::Unhealthy, EngineStats::default())
            }
        };

        Ok(HealthReport {
            status,
            service: service_name.to_string(),
            version: crate::VERSION.to_string(),
            timestamp: chrono::Utc::now(),
            stats,
        })
    }

    /// Lightweight liveness probe.
    pub fn liveness(engine: &Arc<MatchEngine>) -> HealthStatus {
        match engine.get_stats() {
            Ok(_) => HealthStatus::Healthy,
            Err(_) => HealthStatus::Unhealthy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchmakingSettings;
    use crate::provision::MockProvisioner;

    fn test_engine() -> Arc<MatchEngine> {
        MatchEngine::new(
            MatchmakingSettings::default(),
            Arc::new(MockProvisioner::new()),
        )
    }

    #[tokio::test]
    async fn test_healthy_report() {
        let engine = test_engine();
        engine.connect().unwrap();

        let report = HealthCheck::check(&engine, "rally-point").unwrap();
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.service, "rally-point");
        assert_eq!(report.stats.sessions_connected, 1);
    }

    #[tokio::test]
    async fn test_liveness_probe() {
        let engine = test_engine();
        assert_eq!(HealthCheck::liveness(&engine), HealthStatus::Healthy);
    }
}
