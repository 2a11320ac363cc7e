//! Main entry point for the Rally Point matchmaking service
//!
//! This is the production entry point that initializes and runs the
//! session/queue/match lifecycle engine with proper error handling,
//! logging, and graceful shutdown.

use anyhow::Result;
use clap::Parser;
use rally_point::config::AppConfig;
use rally_point::service::{AppState, HealthCheck, HealthStatus};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

/// Rally Point Matchmaking Service - head-to-head session pairing
#[derive(Parser)]
#[command(
    name = "rally-point",
    version,
    about = "A matchmaking service that pairs anonymous clients for head-to-head play",
    long_about = "Rally Point is a Rust-based matchmaking service that tracks client sessions \
                 with expiring liveness deadlines, keeps a FIFO pairing queue, commits matches \
                 deterministically on a periodic tick, and hands each match off to an \
                 asynchronous game server provisioner."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Perform health check and exit
    #[arg(long, help = "Perform a health check and exit with status code")]
    health_check: bool,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// HTTP port override
    #[arg(long, value_name = "PORT", help = "Override HTTP server port")]
    http_port: Option<u16>,

    /// Session TTL override
    #[arg(
        long,
        value_name = "SECONDS",
        help = "Override session time-to-live in seconds"
    )]
    session_ttl: Option<u64>,

    /// Game server address override
    #[arg(
        long,
        value_name = "ADDR",
        help = "Override the address handed to matched clients"
    )]
    server_address: Option<String>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Perform health check and return appropriate exit code
async fn perform_health_check(config: AppConfig) -> Result<()> {
    info!("Performing health check...");

    let app_state = AppState::new(config.clone()).await?;
    let report = HealthCheck::check(&app_state.engine(), &config.service.name)?;

    println!("Health Check: {}", report.status);
    println!("  Active Sessions: {}", report.stats.active_sessions);
    println!("  Players In Queue: {}", report.stats.players_in_queue);
    println!("  Open Matches: {}", report.stats.open_matches);
    println!("  Matches Created: {}", report.stats.matches_created);

    if report.status == HealthStatus::Healthy {
        std::process::exit(0);
    } else {
        std::process::exit(1);
    }
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("Rally Point Matchmaking Service");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   HTTP port: {}", config.service.http_port);
    info!(
        "   Session TTL: {}s",
        config.matchmaking.session_ttl_seconds
    );
    info!(
        "   Pairing interval: {}s",
        config.matchmaking.pairing_interval_seconds
    );
    info!(
        "   Eligibility margin: {}s",
        config.matchmaking.eligibility_margin_seconds
    );
    info!("   Game server: {}", config.provisioner.server_address);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load and merge configuration from environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    // Start with file- or environment-based config
    let mut config = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {}", config_path.display());
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(http_port) = args.http_port {
        config.service.http_port = http_port;
    }

    if let Some(session_ttl) = args.session_ttl {
        config.matchmaking.session_ttl_seconds = session_ttl;
    }

    if let Some(server_address) = &args.server_address {
        config.provisioner.server_address = server_address.clone();
    }

    rally_point::config::validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration (CLI args can override environment/config file)
    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    // Initialize logging early (before any other operations)
    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    // Handle special modes
    if args.health_check {
        return perform_health_check(config).await;
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    // Display startup information
    display_startup_banner(&config);

    // Initialize application state
    info!("Initializing service components...");
    let app_state = match AppState::new(config.clone()).await {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    // Start the service
    info!("Starting service...");
    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    info!("Rally Point Matchmaking Service is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    // Wait for shutdown signal
    wait_for_shutdown_signal().await;

    // Begin graceful shutdown
    info!("Shutdown signal received, beginning graceful shutdown...");

    let shutdown_timeout = config.shutdown_timeout();
    let shutdown_future = async {
        if let Err(e) = app_state.stop().await {
            warn!("Error while stopping service components: {}", e);
        }
        // Give background tasks time to observe the shutdown signal
        sleep(Duration::from_millis(100)).await;
    };

    match tokio::time::timeout(shutdown_timeout, shutdown_future).await {
        Ok(()) => {
            info!("Graceful shutdown completed successfully");
        }
        Err(_) => {
            warn!("Shutdown timeout exceeded, forcing exit");
        }
    }

    info!("Rally Point Matchmaking Service stopped");
    Ok(())
}
