//! Rally Point - session, queue and match lifecycle engine
//!
//! This crate pairs anonymous clients for head-to-head play: it tracks
//! connected sessions with expiring liveness deadlines, keeps a FIFO
//! pairing queue, commits matches deterministically, and hands each match
//! off to an asynchronous server provisioner.

pub mod config;
pub mod error;
pub mod game;
pub mod http;
pub mod matchmaker;
pub mod metrics;
pub mod provision;
pub mod service;
pub mod session;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use matchmaker::{MatchEngine, PairingPolicy};
pub use provision::Provisioner;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
