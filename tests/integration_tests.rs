//! Integration tests for the rally-point matchmaking service
//!
//! These tests validate the entire lifecycle working together, including:
//! - Connect / queue / pairing / provisioning / end-of-match workflows
//! - Liveness expiry interacting with the queue and the matchmaker
//! - Provisioning failure recovery
//! - Concurrent request handling against the engine's single mutation path

// Modules for organizing tests
mod fixtures;

use rally_point::matchmaker::MatchEngine;
use rally_point::types::{MatchStatus, QueueStatus, SessionStatus};
use std::sync::Arc;
use tokio::time::{advance, pause, sleep, Duration};

use fixtures::{connect_and_queue, create_test_engine, test_settings, GatedProvisioner};

/// Let spawned provisioning tasks run to completion.
async fn settle() {
    sleep(Duration::from_millis(20)).await;
}

fn matched_game(engine: &Arc<MatchEngine>, id: rally_point::types::SessionId) -> rally_point::types::MatchSummary {
    match engine.queue_status(id).expect("session exists") {
        QueueStatus::Matched { game } => game,
        other => panic!("expected session {} to be matched, got {:?}", id, other),
    }
}

#[tokio::test]
async fn test_complete_match_workflow() {
    let (engine, provisioner) = create_test_engine();

    let ids = connect_and_queue(&engine, 2);
    let committed = engine.run_pairing_tick().unwrap();
    assert_eq!(committed, 1);
    settle().await;

    // Both sessions observe the same running match with a server address.
    let first_view = matched_game(&engine, ids[0]);
    let second_view = matched_game(&engine, ids[1]);
    assert_eq!(first_view.id, second_view.id);
    assert_eq!(first_view.status, MatchStatus::Running);
    assert!(first_view.server_address.is_some());
    assert_eq!(provisioner.allocation_requests(), vec![first_view.id]);

    // Ending the match hands both sessions back to idle and releases the
    // server best-effort.
    engine.end_match(first_view.id).unwrap();
    settle().await;

    for id in ids {
        assert_eq!(
            engine.session_info(id).unwrap().status,
            SessionStatus::Idle
        );
        assert!(matches!(
            engine.queue_status(id).unwrap(),
            QueueStatus::Idle
        ));
    }
    assert_eq!(provisioner.release_requests().len(), 1);

    let stats = engine.get_stats().unwrap();
    assert_eq!(stats.matches_created, 1);
    assert_eq!(stats.matches_ended, 1);
    assert_eq!(stats.open_matches, 0);
}

#[tokio::test]
async fn test_pairing_commits_in_queue_order() {
    let (engine, _) = create_test_engine();

    let ids = connect_and_queue(&engine, 6);
    let committed = engine.run_pairing_tick().unwrap();
    assert_eq!(committed, 3);
    settle().await;

    // FIFO adjacency: {0,1}, {2,3}, {4,5}.
    for pair in ids.chunks(2) {
        let game = matched_game(&engine, pair[0]);
        assert!(game.session_ids.contains(&pair[1]));
    }
}

#[tokio::test]
async fn test_lone_session_waits_for_partner() {
    let (engine, provisioner) = create_test_engine();

    let ids = connect_and_queue(&engine, 1);
    assert_eq!(engine.run_pairing_tick().unwrap(), 0);

    match engine.queue_status(ids[0]).unwrap() {
        QueueStatus::Queued { players_in_queue } => assert_eq!(players_in_queue, 1),
        other => panic!("expected queued, got {:?}", other),
    }
    assert!(provisioner.allocation_requests().is_empty());

    // A partner arriving later completes the pair.
    connect_and_queue(&engine, 1);
    assert_eq!(engine.run_pairing_tick().unwrap(), 1);
}

#[tokio::test]
async fn test_queued_session_expires_out_of_queue() {
    pause();
    let (engine, _) = create_test_engine();

    let ids = connect_and_queue(&engine, 1);
    advance(Duration::from_secs(301)).await;

    assert_eq!(engine.sweep_expired().unwrap(), 1);
    assert!(engine.session_info(ids[0]).is_err());

    let stats = engine.get_stats().unwrap();
    assert_eq!(stats.active_sessions, 0);
    assert_eq!(stats.players_in_queue, 0);
}

#[tokio::test]
async fn test_pinging_session_outlives_quiet_one() {
    pause();
    let (engine, _) = create_test_engine();

    let ids = connect_and_queue(&engine, 2);

    // Keep the first session alive across two TTL windows; let the second
    // one go quiet.
    for _ in 0..3 {
        advance(Duration::from_secs(150)).await;
        engine.ping(ids[0]).unwrap();
    }

    engine.sweep_expired().unwrap();
    assert!(engine.session_info(ids[0]).is_ok());
    assert!(engine.session_info(ids[1]).is_err());

    // The survivor is still queued, waiting for a new partner.
    match engine.queue_status(ids[0]).unwrap() {
        QueueStatus::Queued { players_in_queue } => assert_eq!(players_in_queue, 1),
        other => panic!("expected queued, got {:?}", other),
    }
}

#[tokio::test]
async fn test_provisioning_failure_recovery() {
    let (engine, provisioner) = create_test_engine();
    provisioner.fail_allocations(true);

    let ids = connect_and_queue(&engine, 2);
    engine.run_pairing_tick().unwrap();
    settle().await;

    // Both sessions are handed back to idle rather than stranded.
    for id in &ids {
        assert_eq!(
            engine.session_info(*id).unwrap().status,
            SessionStatus::Idle
        );
    }
    assert_eq!(engine.get_stats().unwrap().provisioning_failures, 1);

    // The clients can rejoin and match once allocations recover.
    provisioner.fail_allocations(false);
    for id in &ids {
        engine.join_queue(*id).unwrap();
    }
    assert_eq!(engine.run_pairing_tick().unwrap(), 1);
    settle().await;

    assert_eq!(matched_game(&engine, ids[0]).status, MatchStatus::Running);
}

#[tokio::test]
async fn test_end_match_during_provisioning_releases_orphan_server() {
    let provisioner = Arc::new(GatedProvisioner::new());
    let engine = MatchEngine::new(test_settings(), provisioner.clone());

    let ids = connect_and_queue(&engine, 2);
    engine.run_pairing_tick().unwrap();
    settle().await;

    // Allocation is gated: the match is parked in provisioning.
    let game = matched_game(&engine, ids[0]);
    assert_eq!(game.status, MatchStatus::Provisioning);
    assert_eq!(
        engine.session_info(ids[0]).unwrap().status,
        SessionStatus::Provisioning
    );

    // End the match while the server is still spinning up.
    engine.end_match(game.id).unwrap();
    for id in &ids {
        assert_eq!(
            engine.session_info(*id).unwrap().status,
            SessionStatus::Idle
        );
    }
    assert!(provisioner.release_requests().is_empty());

    // When the allocation finally lands, the unwanted server is handed
    // straight back.
    provisioner.open(1);
    settle().await;
    assert_eq!(provisioner.release_requests().len(), 1);
}

#[tokio::test]
async fn test_disconnect_leaves_neighbours_pairable() {
    let (engine, _) = create_test_engine();

    let ids = connect_and_queue(&engine, 3);
    engine.disconnect(ids[1]).unwrap();

    assert_eq!(engine.run_pairing_tick().unwrap(), 1);
    settle().await;

    // The sessions on either side of the departed one pair with each other.
    let game = matched_game(&engine, ids[0]);
    assert!(game.session_ids.contains(&ids[2]));
}

#[tokio::test]
async fn test_exit_queue_then_status_is_idle() {
    let (engine, _) = create_test_engine();

    let ids = connect_and_queue(&engine, 1);
    engine.exit_queue(ids[0]).unwrap();

    assert!(matches!(
        engine.queue_status(ids[0]).unwrap(),
        QueueStatus::Idle
    ));

    // Second exit is a reported conflict, not a silent success.
    assert!(engine.exit_queue(ids[0]).is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_never_double_match() {
    let (engine, _) = create_test_engine();

    let sessions: Vec<_> = (0..16).map(|_| engine.connect().unwrap().id).collect();

    // Hammer the queue from parallel tasks, with a pairing tick racing the
    // joins partway through.
    let mut handles = Vec::new();
    for id in sessions.clone() {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.join_queue(id).unwrap();
        }));
    }
    {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let _ = engine.run_pairing_tick();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Drain whatever is left.
    while engine.run_pairing_tick().unwrap() > 0 {}
    settle().await;

    // Every session is in exactly one match, and every match holds two
    // distinct sessions.
    let mut seen_matches = std::collections::HashMap::new();
    for id in &sessions {
        let game = matched_game(&engine, *id);
        assert!(game.session_ids.contains(id));
        let members = seen_matches
            .entry(game.id)
            .or_insert_with(|| game.session_ids);
        assert_eq!(*members, game.session_ids);
    }
    assert_eq!(seen_matches.len(), sessions.len() / 2);

    let stats = engine.get_stats().unwrap();
    assert_eq!(stats.matches_created, (sessions.len() / 2) as u64);
    assert_eq!(stats.players_in_queue, 0);
}
