//! Pairing strategies for the matchmaking scan
//!
//! This module defines the policy seam between the pairing queue and the
//! matchmaker: a policy is a pure function from a queue snapshot (plus an
//! eligibility predicate) to the pairs that should be committed this tick.
//! Keeping the strategy injectable leaves room for richer matching without
//! touching the queue or the engine.

use crate::types::SessionId;

/// Trait for pairing algorithms
pub trait PairingPolicy: Send + Sync {
    /// Select the pairs to commit from a FIFO snapshot of the queue.
    ///
    /// `eligible` reports whether a session may be committed right now
    /// (live, queued, and far enough from expiry). Ineligible entries must
    /// be left alone; the caller keeps them queued for the next tick.
    fn select_pairs(
        &self,
        snapshot: &[SessionId],
        eligible: &dyn Fn(SessionId) -> bool,
    ) -> Vec<(SessionId, SessionId)>;
}

/// Strict FIFO-adjacency pairing.
///
/// Walks the snapshot head to tail and pairs each eligible session with the
/// next remaining eligible session. Ineligible entries are stepped over and
/// stay queued, so a session close to expiry cannot stall the entries behind
/// it. No reordering, no best-match search.
#[derive(Debug, Default)]
pub struct FifoPairing;

impl FifoPairing {
    pub fn new() -> Self {
        Self
    }
}

impl PairingPolicy for FifoPairing {
    fn select_pairs(
        &self,
        snapshot: &[SessionId],
        eligible: &dyn Fn(SessionId) -> bool,
    ) -> Vec<(SessionId, SessionId)> {
        let mut pairs = Vec::new();
        let mut pending: Option<SessionId> = None;

        for &id in snapshot {
            if !eligible(id) {
                continue;
            }
            match pending.take() {
                Some(first) => pairs.push((first, id)),
                None => pending = Some(id),
            }
        }

        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::generate_session_id;

    fn ids(count: usize) -> Vec<SessionId> {
        (0..count).map(|_| generate_session_id()).collect()
    }

    #[test]
    fn test_pairs_are_fifo_adjacent() {
        let snapshot = ids(4);
        let pairs = FifoPairing::new().select_pairs(&snapshot, &|_| true);

        assert_eq!(
            pairs,
            vec![(snapshot[0], snapshot[1]), (snapshot[2], snapshot[3])]
        );
    }

    #[test]
    fn test_odd_tail_is_left_unpaired() {
        let snapshot = ids(5);
        let pairs = FifoPairing::new().select_pairs(&snapshot, &|_| true);

        assert_eq!(pairs.len(), 2);
        assert!(!pairs
            .iter()
            .any(|(a, b)| *a == snapshot[4] || *b == snapshot[4]));
    }

    #[test]
    fn test_single_entry_yields_nothing() {
        let snapshot = ids(1);
        let pairs = FifoPairing::new().select_pairs(&snapshot, &|_| true);
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_ineligible_entry_is_stepped_over() {
        let snapshot = ids(4);
        let blocked = snapshot[1];
        let pairs = FifoPairing::new().select_pairs(&snapshot, &|id| id != blocked);

        // [A, x, C, D] pairs A with C; D waits for a partner.
        assert_eq!(pairs, vec![(snapshot[0], snapshot[2])]);
    }

    #[test]
    fn test_all_ineligible_yields_nothing() {
        let snapshot = ids(6);
        let pairs = FifoPairing::new().select_pairs(&snapshot, &|_| false);
        assert!(pairs.is_empty());
    }
}
