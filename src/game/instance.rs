//! Match instance implementation and lifecycle management
//!
//! This module contains the match record and its state machine:
//! `Found -> Provisioning -> Running -> Ended`, with a distinct terminal
//! `Failed` state for server allocation failures. Transitions are guarded;
//! the engine drives them under its state lock.

use crate::error::{MatchmakingError, Result};
use crate::provision::ProvisionedServer;
use crate::types::{MatchId, MatchStatus, MatchSummary, SessionId};
use crate::utils::{current_timestamp, generate_match_id};
use chrono::{DateTime, Utc};

/// A committed pairing of exactly two sessions, tracked through server
/// handoff to completion. Records are retained after the match ends for
/// lookup; they are never reused.
#[derive(Debug, Clone)]
pub struct Game {
    id: MatchId,
    session_ids: [SessionId; 2],
    status: MatchStatus,
    server: Option<ProvisionedServer>,
    created_at: DateTime<Utc>,
}

impl Game {
    /// Create a match for two distinct sessions, starting in `Found`.
    pub fn new(first: SessionId, second: SessionId) -> Self {
        debug_assert_ne!(first, second);
        Self {
            id: generate_match_id(),
            session_ids: [first, second],
            status: MatchStatus::Found,
            server: None,
            created_at: current_timestamp(),
        }
    }

    pub fn id(&self) -> MatchId {
        self.id
    }

    pub fn session_ids(&self) -> [SessionId; 2] {
        self.session_ids
    }

    pub fn status(&self) -> MatchStatus {
        self.status
    }

    pub fn server(&self) -> Option<&ProvisionedServer> {
        self.server.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn involves(&self, session_id: SessionId) -> bool {
        self.session_ids.contains(&session_id)
    }

    /// Server allocation has been requested.
    pub fn mark_provisioning(&mut self) -> Result<()> {
        self.transition(MatchStatus::Found, MatchStatus::Provisioning)
    }

    /// Server allocation succeeded; the match is live at `server.address`.
    pub fn mark_running(&mut self, server: ProvisionedServer) -> Result<()> {
        self.transition(MatchStatus::Provisioning, MatchStatus::Running)?;
        self.server = Some(server);
        Ok(())
    }

    /// Server allocation failed. Terminal; the sessions are handed back to
    /// the registry by the engine.
    pub fn mark_failed(&mut self) -> Result<()> {
        self.transition(MatchStatus::Provisioning, MatchStatus::Failed)
    }

    /// Explicit end-of-match signal. Valid from any non-terminal state so a
    /// match can be torn down even while still provisioning.
    pub fn mark_ended(&mut self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(MatchmakingError::InvalidMatchTransition {
                match_id: self.id.to_string(),
                from: self.status.to_string(),
                to: MatchStatus::Ended.to_string(),
            }
            .into());
        }
        self.status = MatchStatus::Ended;
        Ok(())
    }

    fn transition(&mut self, expected: MatchStatus, next: MatchStatus) -> Result<()> {
        if self.status != expected {
            return Err(MatchmakingError::InvalidMatchTransition {
                match_id: self.id.to_string(),
                from: self.status.to_string(),
                to: next.to_string(),
            }
            .into());
        }
        self.status = next;
        Ok(())
    }

    /// Client-facing view of the match.
    pub fn summary(&self) -> MatchSummary {
        MatchSummary {
            id: self.id,
            status: self.status,
            session_ids: self.session_ids,
            server_address: self.server.as_ref().map(|server| server.address.clone()),
        }
    }
}
