//! Match Tester CLI Tool
//!
//! Command-line harness for exercising the matchmaking engine end to end.
//! Simulated clients connect, queue, get paired and are handed to the
//! built-in provisioner, all in process, so no running service is needed.
//!
//! Usage:
//!   cargo run --bin match-tester -- run-scenario --scenario duel
//!   cargo run --bin match-tester -- run-all-scenarios
//!   cargo run --bin match-tester -- soak --clients 64 --rounds 10

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rally_point::config::MatchmakingSettings;
use rally_point::matchmaker::MatchEngine;
use rally_point::provision::{MockProvisioner, StaticProvisioner, StaticProvisionerConfig};
use rally_point::types::{MatchSummary, QueueStatus, SessionId, SessionStatus};
use tokio::time::{sleep, Duration};

#[derive(Parser)]
#[command(name = "match-tester")]
#[command(about = "In-process lifecycle testing tool for the rally-point matchmaking engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a predefined test scenario
    RunScenario {
        /// Scenario name (duel, crowd, slowpoke, dropout)
        #[arg(short, long)]
        scenario: String,
    },
    /// Run all test scenarios
    RunAllScenarios,
    /// Churn many simulated clients through repeated match rounds
    Soak {
        /// Number of simulated clients
        #[arg(short, long, default_value = "64")]
        clients: usize,
        /// Number of match rounds to run
        #[arg(short, long, default_value = "10")]
        rounds: usize,
    },
}

/// Engine wired to the static provisioner, with production-like timings.
fn standard_engine() -> Arc<MatchEngine> {
    MatchEngine::new(
        MatchmakingSettings::default(),
        Arc::new(StaticProvisioner::new(StaticProvisionerConfig::default())),
    )
}

/// Connect one simulated client and put it in the queue.
fn connect_and_queue(engine: &Arc<MatchEngine>) -> Result<SessionId> {
    let session = engine.connect()?;
    engine.join_queue(session.id)?;
    Ok(session.id)
}

/// Poll until the session reports a match, like a real client would.
async fn wait_for_match(
    engine: &Arc<MatchEngine>,
    id: SessionId,
    timeout: Duration,
) -> Result<MatchSummary> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let QueueStatus::Matched { game } = engine.queue_status(id)? {
            return Ok(game);
        }
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("session {} was not matched within {:?}", id, timeout);
        }
        sleep(Duration::from_millis(10)).await;
    }
}

/// Two clients queue, pair, play and finish.
async fn scenario_duel() -> Result<bool> {
    let engine = standard_engine();

    let first = connect_and_queue(&engine)?;
    let second = connect_and_queue(&engine)?;

    if engine.run_pairing_tick()? != 1 {
        return Ok(false);
    }

    let game = wait_for_match(&engine, first, Duration::from_secs(2)).await?;
    if game.server_address.is_none() || !game.session_ids.contains(&second) {
        return Ok(false);
    }

    engine.end_match(game.id)?;
    let both_idle = [first, second]
        .iter()
        .all(|id| matches!(engine.session_info(*id), Ok(info) if info.status == SessionStatus::Idle));
    Ok(both_idle)
}

/// Eight clients queue at once; pairing must follow arrival order.
async fn scenario_crowd() -> Result<bool> {
    let engine = standard_engine();

    let mut ids = Vec::new();
    for _ in 0..8 {
        ids.push(connect_and_queue(&engine)?);
    }

    if engine.run_pairing_tick()? != 4 {
        return Ok(false);
    }

    for pair in ids.chunks(2) {
        let game = wait_for_match(&engine, pair[0], Duration::from_secs(2)).await?;
        if !game.session_ids.contains(&pair[1]) {
            println!("  arrival order broken: {} paired away from {}", pair[0], pair[1]);
            return Ok(false);
        }
    }
    Ok(true)
}

/// A client close to its liveness deadline is passed over until it pings.
async fn scenario_slowpoke() -> Result<bool> {
    let settings = MatchmakingSettings {
        session_ttl_seconds: 3,
        eligibility_margin_seconds: 2,
        ..MatchmakingSettings::default()
    };
    let engine = MatchEngine::new(
        settings,
        Arc::new(StaticProvisioner::new(StaticProvisionerConfig::default())),
    );

    let slowpoke = connect_and_queue(&engine)?;
    sleep(Duration::from_millis(1500)).await;
    let fresh = connect_and_queue(&engine)?;

    // Under two seconds left on the clock: the pair must not be committed.
    if engine.run_pairing_tick()? != 0 {
        return Ok(false);
    }
    if !matches!(engine.queue_status(slowpoke)?, QueueStatus::Queued { .. }) {
        return Ok(false);
    }

    engine.ping(slowpoke)?;
    if engine.run_pairing_tick()? != 1 {
        return Ok(false);
    }

    let game = wait_for_match(&engine, slowpoke, Duration::from_secs(2)).await?;
    Ok(game.session_ids.contains(&fresh))
}

/// Server allocation fails; both clients must come back idle and rematch
/// once allocations recover.
async fn scenario_dropout() -> Result<bool> {
    let provisioner = Arc::new(MockProvisioner::new());
    let engine = MatchEngine::new(MatchmakingSettings::default(), provisioner.clone());
    provisioner.fail_allocations(true);

    let first = connect_and_queue(&engine)?;
    let second = connect_and_queue(&engine)?;
    engine.run_pairing_tick()?;
    sleep(Duration::from_millis(50)).await;

    for id in [first, second] {
        if engine.session_info(id)?.status != SessionStatus::Idle {
            return Ok(false);
        }
    }

    provisioner.fail_allocations(false);
    engine.join_queue(first)?;
    engine.join_queue(second)?;
    if engine.run_pairing_tick()? != 1 {
        return Ok(false);
    }

    wait_for_match(&engine, first, Duration::from_secs(2)).await?;
    Ok(true)
}

async fn run_scenario(name: &str) -> Result<bool> {
    match name {
        "duel" => scenario_duel().await,
        "crowd" => scenario_crowd().await,
        "slowpoke" => scenario_slowpoke().await,
        "dropout" => scenario_dropout().await,
        _ => {
            anyhow::bail!(
                "Unknown scenario '{}'. Available: duel, crowd, slowpoke, dropout",
                name
            )
        }
    }
}

async fn run_soak(clients: usize, rounds: usize) -> Result<()> {
    let engine = standard_engine();

    let ids: Vec<SessionId> = (0..clients)
        .map(|_| engine.connect().map(|snapshot| snapshot.id))
        .collect::<Result<_>>()?;

    for round in 1..=rounds {
        for id in &ids {
            engine.ping(*id)?;
            engine.join_queue(*id)?;
        }
        let committed = engine.run_pairing_tick()?;
        println!("  round {}: {} matches committed", round, committed);

        let mut finished = Vec::new();
        for id in &ids {
            let game = wait_for_match(&engine, *id, Duration::from_secs(5)).await?;
            // The first member of each pair tears the match down for both.
            if game.session_ids[0] == *id {
                finished.push(game.id);
            }
        }
        for game_id in finished {
            engine.end_match(game_id)?;
        }
    }

    let stats = engine.get_stats()?;
    println!("📊 Soak results:");
    println!("  Sessions connected: {}", stats.sessions_connected);
    println!("  Matches created: {}", stats.matches_created);
    println!("  Matches ended: {}", stats.matches_ended);
    println!("  Provisioning failures: {}", stats.provisioning_failures);
    println!("  Players still queued: {}", stats.players_in_queue);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::RunScenario { scenario } => {
            println!("🧪 Running scenario: {}", scenario);
            match run_scenario(&scenario).await {
                Ok(true) => println!("✅ Scenario completed successfully!"),
                Ok(false) => {
                    println!("❌ Scenario failed.");
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("❌ Error running scenario: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::RunAllScenarios => {
            let scenarios = ["duel", "crowd", "slowpoke", "dropout"];
            let mut passed = 0;
            let mut failed = 0;

            println!("🧪 Running all test scenarios...\n");
            for name in scenarios {
                print!("Running '{}' scenario... ", name);
                match run_scenario(name).await {
                    Ok(true) => {
                        println!("✅ PASSED");
                        passed += 1;
                    }
                    Ok(false) => {
                        println!("❌ FAILED");
                        failed += 1;
                    }
                    Err(e) => {
                        println!("❌ FAILED ({})", e);
                        failed += 1;
                    }
                }
            }

            println!("\n📊 Results: {} passed, {} failed", passed, failed);
            if failed > 0 {
                std::process::exit(1);
            }
        }

        Commands::Soak { clients, rounds } => {
            if clients < 2 || clients % 2 != 0 {
                anyhow::bail!("--clients must be an even number of at least 2");
            }
            println!("🧪 Soaking {} clients for {} rounds...", clients, rounds);
            run_soak(clients, rounds).await?;
            println!("✅ Soak completed successfully!");
        }
    }

    Ok(())
}
