//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the engine to
//! its provisioner, spawns the background matchmaking and expiry tasks, and
//! runs the HTTP server.

use crate::config::AppConfig;
use crate::error::Result;
use crate::http::{create_router, ApiState};
use crate::matchmaker::MatchEngine;
use crate::metrics::MetricsCollector;
use crate::provision::{StaticProvisioner, StaticProvisionerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Production application state
pub struct AppState {
    config: AppConfig,
    engine: Arc<MatchEngine>,
    running: RwLock<bool>,
    background_tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    /// Build the service components without starting anything.
    pub async fn new(config: AppConfig) -> Result<Self> {
        let metrics = Arc::new(MetricsCollector::new()?);

        let provisioner = Arc::new(StaticProvisioner::new(StaticProvisionerConfig {
            server_address: config.provisioner.server_address.clone(),
            allocation_delay: config.provisioner.allocation_delay(),
        }));

        let engine = MatchEngine::with_metrics(config.matchmaking.clone(), provisioner, metrics);

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            engine,
            running: RwLock::new(false),
            background_tasks: Mutex::new(Vec::new()),
            shutdown_tx,
        })
    }

    /// Start background tasks and the HTTP server.
    pub async fn start(&self) -> Result<()> {
        let mut tasks = self.background_tasks.lock().await;

        tasks.push(self.engine.clone().start_pairing_task());
        tasks.push(self.engine.clone().start_expiry_task());
        info!(
            "Started matchmaking tick (every {}s) and expiry sweep (every {}s)",
            self.config.matchmaking.pairing_interval_seconds,
            self.config.matchmaking.expiry_sweep_interval_seconds
        );

        let addr: SocketAddr = format!("0.0.0.0:{}", self.config.service.http_port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid API server address: {}", e))?;
        let listener = TcpListener::bind(addr).await?;
        info!("API server listening on http://{}", addr);

        let router = create_router(ApiState {
            engine: self.engine.clone(),
            service_name: self.config.service.name.clone(),
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tasks.push(tokio::spawn(async move {
            let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("API server shutdown signal received");
            });

            if let Err(e) = serve.await {
                error!("API server error: {}", e);
            }
        }));

        *self.running.write().await = true;
        Ok(())
    }

    /// Signal shutdown and stop the background tasks.
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping service components...");

        if self.shutdown_tx.send(()).is_err() {
            warn!("No API server was listening for shutdown");
        }

        let mut tasks = self.background_tasks.lock().await;
        for task in tasks.drain(..) {
            task.abort();
        }

        *self.running.write().await = false;
        info!("Service components stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Access the engine (for health checks and tests)
    pub fn engine(&self) -> Arc<MatchEngine> {
        self.engine.clone()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
