//! Error types for the matchmaking engine
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Match not found: {match_id}")]
    MatchNotFound { match_id: String },

    #[error("Already in queue: {session_id}")]
    AlreadyQueued { session_id: String },

    #[error("Not in queue: {session_id}")]
    NotInQueue { session_id: String },

    #[error("Session {session_id} cannot join the queue while {status}")]
    SessionBusy { session_id: String, status: String },

    #[error("Invalid match transition for {match_id}: {from} -> {to}")]
    InvalidMatchTransition {
        match_id: String,
        from: String,
        to: String,
    },

    #[error("Provisioning failed: {reason}")]
    ProvisioningFailed { reason: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}
