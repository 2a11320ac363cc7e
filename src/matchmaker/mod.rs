//! Matchmaking core for the rally-point service
//!
//! This module contains the engine that owns all mutable matchmaking state
//! and the injectable pairing policy it scans the queue with.

pub mod engine;
pub mod pairing;

// Re-export commonly used types
pub use engine::{EngineStats, MatchEngine};
pub use pairing::{FifoPairing, PairingPolicy};
