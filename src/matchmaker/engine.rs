//! Matchmaking engine: the single mutation domain
//!
//! This module provides the core `MatchEngine` that owns the session
//! registry, the pairing queue and the match table behind one state lock.
//! Request handlers, the periodic pairing tick, the expiry sweeper and
//! provisioner completions all funnel through that lock, so every
//! cross-structure step ("remove from queue AND mark idle", "remove from
//! queue AND delete session") is one atomic unit.
//!
//! The lock is never held across an await; the only suspension points are
//! the provisioner calls, which run in spawned tasks and re-enter the lock
//! when they resolve.

use crate::config::MatchmakingSettings;
use crate::error::{MatchmakingError, Result};
use crate::game::Game;
use crate::matchmaker::pairing::{FifoPairing, PairingPolicy};
use crate::metrics::MetricsCollector;
use crate::provision::{AllocationRequest, ProvisionedServer, Provisioner};
use crate::session::registry::Session;
use crate::session::{PairingQueue, SessionRegistry};
use crate::types::{MatchId, QueueStatus, SessionId, SessionSnapshot, SessionStatus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant};
use tracing::{debug, error, info, warn};

/// Statistics about engine operations
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct EngineStats {
    /// Total number of sessions connected
    pub sessions_connected: u64,
    /// Total number of sessions expired by the sweeper
    pub sessions_expired: u64,
    /// Total number of explicit disconnects
    pub sessions_disconnected: u64,
    /// Total number of matches committed
    pub matches_created: u64,
    /// Total number of matches ended
    pub matches_ended: u64,
    /// Total number of server allocation failures
    pub provisioning_failures: u64,
    /// Current number of known sessions
    pub active_sessions: usize,
    /// Current number of sessions waiting in the queue
    pub players_in_queue: usize,
    /// Current number of non-terminal matches
    pub open_matches: usize,
}

/// Registry, queue and match table, guarded together.
///
/// Keeping all three under one lock is deliberate: a dangling queue entry
/// (session deleted but id still queued) is the most damaging bug class for
/// this system, and it can only arise if the two structures are mutated in
/// separate critical sections.
struct CoreState {
    registry: SessionRegistry,
    queue: PairingQueue,
    games: HashMap<MatchId, Game>,
}

/// The matchmaking engine
pub struct MatchEngine {
    state: Mutex<CoreState>,
    stats: RwLock<EngineStats>,
    provisioner: Arc<dyn Provisioner>,
    pairing_policy: Arc<dyn PairingPolicy>,
    settings: MatchmakingSettings,
    metrics: Arc<MetricsCollector>,
    /// Handle back to the owning Arc, used to spawn provisioning tasks
    /// that re-enter the engine when the provisioner resolves.
    handle: Weak<MatchEngine>,
}

impl MatchEngine {
    /// Create a new engine with the default FIFO pairing policy
    pub fn new(settings: MatchmakingSettings, provisioner: Arc<dyn Provisioner>) -> Arc<Self> {
        let metrics = Arc::new(MetricsCollector::new().unwrap_or_else(|_| {
            warn!("Failed to create metrics collector, using default");
            MetricsCollector::default()
        }));

        Self::with_metrics(settings, provisioner, metrics)
    }

    /// Create a new engine with an explicit metrics collector
    pub fn with_metrics(
        settings: MatchmakingSettings,
        provisioner: Arc<dyn Provisioner>,
        metrics: Arc<MetricsCollector>,
    ) -> Arc<Self> {
        Self::with_pairing_policy(settings, provisioner, Arc::new(FifoPairing::new()), metrics)
    }

    /// Create a new engine with a custom pairing policy
    pub fn with_pairing_policy(
        settings: MatchmakingSettings,
        provisioner: Arc<dyn Provisioner>,
        pairing_policy: Arc<dyn PairingPolicy>,
        metrics: Arc<MetricsCollector>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|handle| Self {
            state: Mutex::new(CoreState {
                registry: SessionRegistry::new(settings.session_ttl()),
                queue: PairingQueue::new(),
                games: HashMap::new(),
            }),
            stats: RwLock::new(EngineStats::default()),
            provisioner,
            pairing_policy,
            settings,
            metrics,
            handle: handle.clone(),
        })
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, CoreState>> {
        self.state.lock().map_err(|_| {
            MatchmakingError::InternalError {
                message: "Failed to acquire state lock".to_string(),
            }
            .into()
        })
    }

    fn snapshot(session: &Session, now: Instant) -> SessionSnapshot {
        SessionSnapshot {
            id: session.id,
            status: session.status,
            remaining_ttl_seconds: session.remaining_ttl(now).as_secs(),
        }
    }

    /// Remove a dead session: queue entry first (if any), then the record.
    /// Idempotent; returns whether a session was actually deleted.
    fn expire_locked(&self, state: &mut CoreState, id: SessionId) -> bool {
        state.queue.remove(id);
        match state.registry.remove(id) {
            Some(session) => {
                info!("Session expired: {} (was {})", id, session.status);
                self.metrics.sessions_expired_total.inc();
                self.metrics.active_sessions.set(state.registry.len() as i64);
                self.metrics.queue_depth.set(state.queue.len() as i64);
                if let Ok(mut stats) = self.stats.write() {
                    stats.sessions_expired += 1;
                }
                true
            }
            None => false,
        }
    }

    /// The registry is the source of truth for liveness: a session whose
    /// deadline has passed is dead even if the sweeper has not run yet.
    fn prune_if_expired(&self, state: &mut CoreState, id: SessionId, now: Instant) {
        let expired = state
            .registry
            .get(id)
            .map_or(false, |session| session.is_expired(now));
        if expired {
            self.expire_locked(state, id);
        }
    }

    fn not_found(id: SessionId) -> anyhow::Error {
        MatchmakingError::SessionNotFound {
            session_id: id.to_string(),
        }
        .into()
    }

    /// Allocate a fresh session. Never fails.
    pub fn connect(&self) -> Result<SessionSnapshot> {
        let now = Instant::now();
        let snapshot = {
            let mut state = self.lock_state()?;
            let session = state.registry.connect(now);
            self.metrics.sessions_connected_total.inc();
            self.metrics.active_sessions.set(state.registry.len() as i64);
            Self::snapshot(&session, now)
        };

        if let Ok(mut stats) = self.stats.write() {
            stats.sessions_connected += 1;
        }

        info!("Session connected: {}", snapshot.id);
        Ok(snapshot)
    }

    /// Pure lookup of a session's status and remaining TTL.
    pub fn session_info(&self, id: SessionId) -> Result<SessionSnapshot> {
        let now = Instant::now();
        let mut state = self.lock_state()?;
        self.prune_if_expired(&mut state, id, now);

        let session = state.registry.get(id).ok_or_else(|| Self::not_found(id))?;
        Ok(Self::snapshot(session, now))
    }

    /// Reset the session's TTL. Returns the refreshed remaining TTL.
    pub fn ping(&self, id: SessionId) -> Result<u64> {
        let now = Instant::now();
        let mut state = self.lock_state()?;
        self.prune_if_expired(&mut state, id, now);

        if !state.registry.touch(id, now) {
            return Err(Self::not_found(id));
        }

        debug!("Session pinged: {}", id);
        Ok(self.settings.session_ttl().as_secs())
    }

    /// Explicitly remove a session: queue entry first, then the record.
    pub fn disconnect(&self, id: SessionId) -> Result<()> {
        let now = Instant::now();
        {
            let mut state = self.lock_state()?;
            self.prune_if_expired(&mut state, id, now);

            if !state.registry.contains(id) {
                return Err(Self::not_found(id));
            }
            state.queue.remove(id);
            state.registry.remove(id);

            self.metrics.active_sessions.set(state.registry.len() as i64);
            self.metrics.queue_depth.set(state.queue.len() as i64);
        }

        if let Ok(mut stats) = self.stats.write() {
            stats.sessions_disconnected += 1;
        }

        info!("Session disconnected: {}", id);
        Ok(())
    }

    /// Append a session to the pairing queue.
    pub fn join_queue(&self, id: SessionId) -> Result<()> {
        let now = Instant::now();
        let mut state = self.lock_state()?;
        self.prune_if_expired(&mut state, id, now);

        let status = state
            .registry
            .get(id)
            .map(|session| session.status)
            .ok_or_else(|| Self::not_found(id))?;

        match status {
            SessionStatus::Idle => {}
            SessionStatus::Queued => {
                return Err(MatchmakingError::AlreadyQueued {
                    session_id: id.to_string(),
                }
                .into());
            }
            SessionStatus::Matched | SessionStatus::Provisioning | SessionStatus::Active => {
                return Err(MatchmakingError::SessionBusy {
                    session_id: id.to_string(),
                    status: status.to_string(),
                }
                .into());
            }
        }

        // Enqueue and flip the status in the same critical section.
        if !state.queue.enqueue(id) {
            return Err(MatchmakingError::AlreadyQueued {
                session_id: id.to_string(),
            }
            .into());
        }
        if let Some(session) = state.registry.get_mut(id) {
            session.status = SessionStatus::Queued;
        }

        let depth = state.queue.len();
        self.metrics.queue_depth.set(depth as i64);
        info!("Session {} joined queue (depth {})", id, depth);
        Ok(())
    }

    /// Remove a session from the pairing queue, returning it to idle.
    pub fn exit_queue(&self, id: SessionId) -> Result<()> {
        let now = Instant::now();
        let mut state = self.lock_state()?;
        self.prune_if_expired(&mut state, id, now);

        if !state.registry.contains(id) {
            return Err(Self::not_found(id));
        }
        if !state.queue.remove(id) {
            return Err(MatchmakingError::NotInQueue {
                session_id: id.to_string(),
            }
            .into());
        }
        if let Some(session) = state.registry.get_mut(id) {
            session.status = SessionStatus::Idle;
        }

        let depth = state.queue.len();
        self.metrics.queue_depth.set(depth as i64);
        info!("Session {} left queue (depth {})", id, depth);
        Ok(())
    }

    /// Report whether a session is matched, still queued, or idle.
    /// Queue membership is checked by identifier.
    pub fn queue_status(&self, id: SessionId) -> Result<QueueStatus> {
        let now = Instant::now();
        let mut state = self.lock_state()?;
        self.prune_if_expired(&mut state, id, now);

        let session = state.registry.get(id).ok_or_else(|| Self::not_found(id))?;

        if let Some(match_id) = session.match_id {
            let game = state.games.get(&match_id).ok_or_else(|| {
                MatchmakingError::InternalError {
                    message: format!("session {} references missing match {}", id, match_id),
                }
            })?;
            return Ok(QueueStatus::Matched {
                game: game.summary(),
            });
        }

        if state.queue.contains(id) {
            Ok(QueueStatus::Queued {
                players_in_queue: state.queue.len(),
            })
        } else {
            Ok(QueueStatus::Idle)
        }
    }

    /// One pairing scan: commit FIFO-adjacent eligible pairs and hand each
    /// committed match to provisioning. Returns the number of matches
    /// committed.
    pub fn run_pairing_tick(&self) -> Result<usize> {
        let now = Instant::now();
        let committed: Vec<MatchId> = {
            let mut state = self.lock_state()?;

            if state.queue.len() < 2 {
                debug!(
                    "Not enough queued sessions to pair ({})",
                    state.queue.len()
                );
                return Ok(0);
            }

            let snapshot = state.queue.snapshot();
            let margin = self.settings.eligibility_margin();
            let pairs = {
                let registry = &state.registry;
                self.pairing_policy.select_pairs(&snapshot, &|id| {
                    registry.get(id).map_or(false, |session| {
                        session.status == SessionStatus::Queued
                            && session.remaining_ttl(now) >= margin
                    })
                })
            };

            let mut committed = Vec::new();
            for (first, second) in pairs {
                // Revalidate before committing; the policy is injectable and
                // therefore untrusted.
                let valid = first != second
                    && state
                        .registry
                        .get(first)
                        .map_or(false, |s| s.status == SessionStatus::Queued)
                    && state
                        .registry
                        .get(second)
                        .map_or(false, |s| s.status == SessionStatus::Queued);
                if !valid {
                    warn!(
                        "Skipping pair ({}, {}) that failed revalidation",
                        first, second
                    );
                    continue;
                }

                let game = Game::new(first, second);
                let match_id = game.id();

                // Queue removal and session transition are one atomic step.
                state.queue.remove(first);
                state.queue.remove(second);
                for id in [first, second] {
                    if let Some(session) = state.registry.get_mut(id) {
                        session.status = SessionStatus::Matched;
                        session.match_id = Some(match_id);
                    }
                }
                state.games.insert(match_id, game);
                committed.push(match_id);

                info!(
                    "Match {} found for sessions {} and {}",
                    match_id, first, second
                );
            }

            self.metrics.queue_depth.set(state.queue.len() as i64);
            committed
        };

        let count = committed.len();
        if count > 0 {
            self.metrics.matches_created_total.inc_by(count as u64);
            if let Ok(mut stats) = self.stats.write() {
                stats.matches_created += count as u64;
            }
        }

        for match_id in committed {
            // A failed handoff must not abort the handoffs behind it; the
            // pair is already committed and the failure is reported.
            if let Err(e) = self.begin_provisioning(match_id) {
                warn!("Failed to start provisioning for match {}: {}", match_id, e);
            }
        }

        Ok(count)
    }

    /// Transition a found match to provisioning and spawn the allocation.
    fn begin_provisioning(&self, match_id: MatchId) -> Result<()> {
        let request = {
            let mut guard = self.lock_state()?;
            let state = &mut *guard;
            let game = state.games.get_mut(&match_id).ok_or_else(|| {
                MatchmakingError::MatchNotFound {
                    match_id: match_id.to_string(),
                }
            })?;
            game.mark_provisioning()?;

            let session_ids = game.session_ids();
            for id in session_ids {
                if let Some(session) = state.registry.get_mut(id) {
                    session.status = SessionStatus::Provisioning;
                }
            }
            AllocationRequest {
                match_id,
                session_ids,
            }
        };

        info!("Provisioning server for match {}", match_id);

        if let Some(engine) = self.handle.upgrade() {
            tokio::spawn(async move {
                let result = engine.provisioner.allocate(request).await;
                engine.finish_provisioning(match_id, result);
            });
        }

        Ok(())
    }

    /// Re-enter the mutation path with the allocation outcome.
    fn finish_provisioning(&self, match_id: MatchId, result: Result<ProvisionedServer>) {
        match result {
            Ok(server) => match self.complete_provisioning(match_id, server) {
                Ok(None) => {}
                Ok(Some(orphan)) => {
                    // The match was torn down while the server was spinning
                    // up; hand the server straight back.
                    warn!(
                        "Match {} no longer wants server {}, releasing",
                        match_id, orphan.server_id
                    );
                    self.spawn_release(orphan);
                }
                Err(e) => error!("Failed to record provisioned match {}: {}", match_id, e),
            },
            Err(e) => {
                warn!("Provisioning failed for match {}: {}", match_id, e);
                if let Err(e) = self.fail_provisioning(match_id) {
                    error!("Failed to record provisioning failure for {}: {}", match_id, e);
                }
            }
        }
    }

    /// Record a successful allocation. Returns the server back if the match
    /// reached a terminal state while the allocation was in flight.
    fn complete_provisioning(
        &self,
        match_id: MatchId,
        server: ProvisionedServer,
    ) -> Result<Option<ProvisionedServer>> {
        let mut guard = self.lock_state()?;
        let state = &mut *guard;
        let game = state.games.get_mut(&match_id).ok_or_else(|| {
            MatchmakingError::MatchNotFound {
                match_id: match_id.to_string(),
            }
        })?;

        if game.status().is_terminal() {
            return Ok(Some(server));
        }

        let address = server.address.clone();
        game.mark_running(server)?;
        for id in game.session_ids() {
            if let Some(session) = state.registry.get_mut(id) {
                session.status = SessionStatus::Active;
            }
        }

        info!("Match {} running at {}", match_id, address);
        Ok(None)
    }

    /// Record a failed allocation: the match is terminally failed and both
    /// sessions are handed back to idle rather than left stuck in matched.
    fn fail_provisioning(&self, match_id: MatchId) -> Result<()> {
        {
            let mut guard = self.lock_state()?;
            let state = &mut *guard;
            let game = state.games.get_mut(&match_id).ok_or_else(|| {
                MatchmakingError::MatchNotFound {
                    match_id: match_id.to_string(),
                }
            })?;

            if game.status().is_terminal() {
                return Ok(());
            }
            game.mark_failed()?;

            for id in game.session_ids() {
                if let Some(session) = state.registry.get_mut(id) {
                    session.status = SessionStatus::Idle;
                    session.match_id = None;
                }
            }
        }

        self.metrics.provisioning_failures_total.inc();
        if let Ok(mut stats) = self.stats.write() {
            stats.provisioning_failures += 1;
        }

        warn!(
            "Match {} failed to provision; sessions returned to idle",
            match_id
        );
        Ok(())
    }

    /// Explicit end-of-match signal. Release is fire-and-forget: the match
    /// transitions to ended regardless of the release outcome. Ending an
    /// already-terminal match is an idempotent ack.
    pub fn end_match(&self, match_id: MatchId) -> Result<()> {
        let server = {
            let mut guard = self.lock_state()?;
            let state = &mut *guard;
            let game = state.games.get_mut(&match_id).ok_or_else(|| {
                MatchmakingError::MatchNotFound {
                    match_id: match_id.to_string(),
                }
            })?;

            if game.status().is_terminal() {
                debug!("Match {} already {}", match_id, game.status());
                return Ok(());
            }
            game.mark_ended()?;
            let server = game.server().cloned();

            for id in game.session_ids() {
                if let Some(session) = state.registry.get_mut(id) {
                    session.status = SessionStatus::Idle;
                    session.match_id = None;
                }
            }
            server
        };

        self.metrics.matches_ended_total.inc();
        if let Ok(mut stats) = self.stats.write() {
            stats.matches_ended += 1;
        }

        info!("Match {} ended", match_id);

        if let Some(server) = server {
            self.spawn_release(server);
        }
        Ok(())
    }

    fn spawn_release(&self, server: ProvisionedServer) {
        let provisioner = self.provisioner.clone();
        tokio::spawn(async move {
            if let Err(e) = provisioner.release(server.server_id).await {
                warn!("Failed to release server {}: {}", server.server_id, e);
            }
        });
    }

    /// Delete every session whose deadline has passed. Returns the number of
    /// sessions removed.
    pub fn sweep_expired(&self) -> Result<usize> {
        let now = Instant::now();
        let mut state = self.lock_state()?;

        let expired = state.registry.expired_ids(now);
        let mut removed = 0;
        for id in expired {
            if self.expire_locked(&mut state, id) {
                removed += 1;
            }
        }

        if removed > 0 {
            info!("Expired {} dead sessions", removed);
        }
        Ok(removed)
    }

    /// Start the periodic pairing tick.
    pub fn start_pairing_task(self: Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(&self);

        tokio::spawn(async move {
            let mut tick = interval(engine.settings.pairing_interval());

            loop {
                tick.tick().await;
                engine.metrics.pairing_ticks_total.inc();

                // Soft failure: queue state is preserved for the next tick.
                if let Err(e) = engine.run_pairing_tick() {
                    engine.metrics.tick_failures_total.inc();
                    error!("Matchmaking tick failed: {}", e);
                }
            }
        })
    }

    /// Start the periodic expiry sweep.
    pub fn start_expiry_task(self: Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(&self);

        tokio::spawn(async move {
            let mut tick = interval(engine.settings.expiry_sweep_interval());

            loop {
                tick.tick().await;
                if let Err(e) = engine.sweep_expired() {
                    error!("Expiry sweep failed: {}", e);
                }
            }
        })
    }

    /// Current engine statistics
    pub fn get_stats(&self) -> Result<EngineStats> {
        let (active_sessions, players_in_queue, open_matches) = {
            let state = self.lock_state()?;
            (
                state.registry.len(),
                state.queue.len(),
                state
                    .games
                    .values()
                    .filter(|game| !game.status().is_terminal())
                    .count(),
            )
        };

        let mut stats = self
            .stats
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire stats lock".to_string(),
            })?
            .clone();

        stats.active_sessions = active_sessions;
        stats.players_in_queue = players_in_queue;
        stats.open_matches = open_matches;
        Ok(stats)
    }

    /// Metrics collector backing this engine
    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    /// Check the cross-structure invariants the engine exists to defend.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        let state = self.state.lock().expect("state lock");
        let snapshot = state.queue.snapshot();

        // Every queue entry resolves to a session with queued status.
        for id in &snapshot {
            let session = state
                .registry
                .get(*id)
                .expect("queued id resolves to a session");
            assert_eq!(session.status, SessionStatus::Queued);
        }

        for session in state.registry.sessions() {
            // Queued status means exactly one queue entry; any other status
            // means none.
            let occurrences = snapshot.iter().filter(|id| **id == session.id).count();
            if session.status == SessionStatus::Queued {
                assert_eq!(occurrences, 1, "queued session appears once in queue");
            } else {
                assert_eq!(occurrences, 0, "non-queued session is absent from queue");
            }

            // A match back-reference exists exactly while the session is in
            // a match-bound status, and points at a match that names it.
            let match_bound = matches!(
                session.status,
                SessionStatus::Matched | SessionStatus::Provisioning | SessionStatus::Active
            );
            match session.match_id {
                Some(match_id) => {
                    assert!(match_bound, "match reference implies match-bound status");
                    let game = state
                        .games
                        .get(&match_id)
                        .expect("match reference resolves");
                    assert!(game.involves(session.id));
                }
                None => assert!(!match_bound, "match-bound status implies match reference"),
            }
        }

        // Open matches point back at their members (members may have
        // disconnected; those that remain must agree).
        for game in state.games.values() {
            if game.status().is_terminal() {
                continue;
            }
            for id in game.session_ids() {
                if let Some(session) = state.registry.get(id) {
                    assert_eq!(session.match_id, Some(game.id()));
                }
            }
        }
    }
}
