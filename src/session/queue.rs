//! Pairing queue implementation
//!
//! This module contains the ordered waiting list of session identifiers
//! eligible for matching. The queue is a plain data structure; the engine
//! owns it behind its state lock and is the only component that mutates it.

use crate::types::SessionId;
use std::collections::VecDeque;

/// FIFO waiting list of session identifiers.
///
/// No identifier ever appears twice. Removal takes out exactly one element;
/// the remaining order is preserved.
#[derive(Debug, Default)]
pub struct PairingQueue {
    entries: VecDeque<SessionId>,
}

impl PairingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a session to the tail of the queue.
    ///
    /// Returns `false` (and leaves the queue untouched) if the session is
    /// already present, making repeated joins idempotent.
    pub fn enqueue(&mut self, id: SessionId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.entries.push_back(id);
        true
    }

    /// Remove the single occurrence of `id` from the queue.
    ///
    /// Returns `false` if the session was not queued. Exactly one element is
    /// removed on success; entries behind it keep their relative order.
    pub fn remove(&mut self, id: SessionId) -> bool {
        match self.entries.iter().position(|queued| *queued == id) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Membership check by session identifier.
    pub fn contains(&self, id: SessionId) -> bool {
        self.entries.iter().any(|queued| *queued == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the queue in FIFO order, for the pairing scan.
    pub fn snapshot(&self) -> Vec<SessionId> {
        self.entries.iter().copied().collect()
    }
}
