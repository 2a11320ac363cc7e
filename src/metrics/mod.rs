//! Metrics and monitoring for the rally-point matchmaking service
//!
//! This module provides Prometheus metrics collection for the lifecycle
//! engine. The collector is exposed over HTTP by the API router.

pub mod collector;

pub use collector::MetricsCollector;
