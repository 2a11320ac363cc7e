//! Common types used throughout the matchmaking engine

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for client sessions
pub type SessionId = Uuid;

/// Unique identifier for matches
pub type MatchId = Uuid;

/// Unique identifier for provisioned game servers
pub type ServerId = Uuid;

/// Lifecycle state of a connected client session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Connected, not waiting for a match
    Idle,
    /// Waiting in the pairing queue
    Queued,
    /// Paired into a match, server not yet requested
    Matched,
    /// Match is waiting on server allocation
    Provisioning,
    /// Match is running on an allocated server
    Active,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "idle"),
            SessionStatus::Queued => write!(f, "queued"),
            SessionStatus::Matched => write!(f, "matched"),
            SessionStatus::Provisioning => write!(f, "provisioning"),
            SessionStatus::Active => write!(f, "active"),
        }
    }
}

/// Lifecycle state of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Pair committed, server not yet requested
    Found,
    /// Waiting on server allocation
    Provisioning,
    /// Server allocated, match in progress
    Running,
    /// Server allocation failed (terminal)
    Failed,
    /// Match finished (terminal)
    Ended,
}

impl MatchStatus {
    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStatus::Failed | MatchStatus::Ended)
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStatus::Found => write!(f, "found"),
            MatchStatus::Provisioning => write!(f, "provisioning"),
            MatchStatus::Running => write!(f, "running"),
            MatchStatus::Failed => write!(f, "failed"),
            MatchStatus::Ended => write!(f, "ended"),
        }
    }
}

/// Point-in-time view of a session, as reported to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub status: SessionStatus,
    /// Seconds until the session expires absent a ping
    pub remaining_ttl_seconds: u64,
}

/// Point-in-time view of a match, as reported to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSummary {
    pub id: MatchId,
    pub status: MatchStatus,
    pub session_ids: [SessionId; 2],
    /// Address of the allocated server, present once the match is running
    pub server_address: Option<String>,
}

/// Answer to a queue-status poll
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum QueueStatus {
    /// Session has been paired; match details attached
    Matched { game: MatchSummary },
    /// Session is waiting; current queue length attached
    Queued { players_in_queue: usize },
    /// Session is connected but not waiting
    Idle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(SessionStatus::Queued.to_string(), "queued");
        assert_eq!(MatchStatus::Provisioning.to_string(), "provisioning");
    }

    #[test]
    fn test_terminal_match_states() {
        assert!(MatchStatus::Failed.is_terminal());
        assert!(MatchStatus::Ended.is_terminal());
        assert!(!MatchStatus::Found.is_terminal());
        assert!(!MatchStatus::Running.is_terminal());
    }

    #[test]
    fn test_queue_status_serialization() {
        let status = QueueStatus::Queued {
            players_in_queue: 3,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "queued");
        assert_eq!(json["players_in_queue"], 3);
    }
}
