//! Session registry implementation
//!
//! This module owns the set of known client sessions and their per-client
//! state. It is the sole authority on session lifetime: sessions are created
//! on connect and destroyed on explicit disconnect or deadline expiry.
//!
//! The registry is a plain data structure. The engine owns it behind its
//! state lock so that every registry mutation can be paired atomically with
//! the matching pairing-queue update.

use crate::types::{MatchId, SessionId, SessionStatus};
use crate::utils::{current_timestamp, generate_session_id};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::time::{Duration, Instant};

/// Per-connected-client state record with a liveness deadline
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub status: SessionStatus,
    /// Monotonic deadline; the session is logically dead once passed
    pub deadline: Instant,
    /// Back-reference to the match this session belongs to.
    /// Set only while status is Matched, Provisioning or Active.
    pub match_id: Option<MatchId>,
    pub connected_at: DateTime<Utc>,
}

impl Session {
    /// Time left before the session is considered dead
    pub fn remaining_ttl(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }
}

/// The set of known sessions, keyed by identifier
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
    session_ttl: Duration,
}

impl SessionRegistry {
    pub fn new(session_ttl: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            session_ttl,
        }
    }

    /// Allocate a fresh session. Always succeeds; the new session starts
    /// idle with a full TTL.
    pub fn connect(&mut self, now: Instant) -> Session {
        let session = Session {
            id: generate_session_id(),
            status: SessionStatus::Idle,
            deadline: now + self.session_ttl,
            match_id: None,
            connected_at: current_timestamp(),
        };
        self.sessions.insert(session.id, session.clone());
        session
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    /// Reset the liveness deadline to a full TTL from `now`.
    ///
    /// The stored deadline is the only pending expiry for the session, so
    /// rescheduling is a plain overwrite. Returns `false` for unknown ids.
    pub fn touch(&mut self, id: SessionId, now: Instant) -> bool {
        match self.sessions.get_mut(&id) {
            Some(session) => {
                session.deadline = now + self.session_ttl;
                true
            }
            None => false,
        }
    }

    /// Delete a session outright. The caller is responsible for removing the
    /// id from the pairing queue in the same critical section.
    pub fn remove(&mut self, id: SessionId) -> Option<Session> {
        self.sessions.remove(&id)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Iterate over all known sessions.
    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Ids of all sessions whose deadline has passed, for the expiry sweep.
    pub fn expired_ids(&self, now: Instant) -> Vec<SessionId> {
        self.sessions
            .values()
            .filter(|session| session.is_expired(now))
            .map(|session| session.id)
            .collect()
    }
}
