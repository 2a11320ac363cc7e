//! Server provisioner contract and in-process implementations
//!
//! The engine hands each committed match to a provisioner, which allocates
//! an ephemeral game server and later tears it down. Allocation latency is
//! unbounded; the engine never blocks a request or a matchmaking tick on it.
//! Production deployments supply an implementation that drives a real
//! compute API; this crate ships a static implementation for local runs and
//! a mock for tests.

use crate::error::{MatchmakingError, Result};
use crate::types::{MatchId, ServerId, SessionId};
use crate::utils::generate_server_id;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};
use tracing::info;

/// Context handed to the provisioner for one match
#[derive(Debug, Clone)]
pub struct AllocationRequest {
    pub match_id: MatchId,
    pub session_ids: [SessionId; 2],
}

/// Result of a successful allocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionedServer {
    pub server_id: ServerId,
    /// Network address clients use to reach the server
    pub address: String,
}

/// Trait for allocating and releasing match servers
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Allocate a server for a match. Resolves exactly once, either with a
    /// reachable server or an error.
    async fn allocate(&self, request: AllocationRequest) -> Result<ProvisionedServer>;

    /// Release a previously allocated server. Best-effort; the engine
    /// reports failures but never blocks on them.
    async fn release(&self, server_id: ServerId) -> Result<()>;
}

/// Configuration for the static provisioner
#[derive(Debug, Clone)]
pub struct StaticProvisionerConfig {
    /// Address reported for every allocated server
    pub server_address: String,
    /// Simulated spin-up delay before an allocation resolves
    pub allocation_delay: Duration,
}

impl Default for StaticProvisionerConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:7777".to_string(),
            allocation_delay: Duration::from_millis(0),
        }
    }
}

/// Provisioner that hands out a fixed, pre-deployed server address.
///
/// Useful for local development and single-host deployments where one game
/// server binary is already running and matches share it.
#[derive(Debug, Clone)]
pub struct StaticProvisioner {
    config: StaticProvisionerConfig,
}

impl StaticProvisioner {
    pub fn new(config: StaticProvisionerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Provisioner for StaticProvisioner {
    async fn allocate(&self, request: AllocationRequest) -> Result<ProvisionedServer> {
        if self.config.allocation_delay > Duration::from_millis(0) {
            sleep(self.config.allocation_delay).await;
        }

        let server = ProvisionedServer {
            server_id: generate_server_id(),
            address: self.config.server_address.clone(),
        };

        info!(
            "Allocated static server {} at {} for match {}",
            server.server_id, server.address, request.match_id
        );
        Ok(server)
    }

    async fn release(&self, server_id: ServerId) -> Result<()> {
        info!("Released static server {}", server_id);
        Ok(())
    }
}

/// Mock provisioner for testing
///
/// Records every allocate/release call and can be scripted to fail
/// allocations.
#[derive(Debug, Default)]
pub struct MockProvisioner {
    allocations: std::sync::Mutex<Vec<MatchId>>,
    releases: std::sync::Mutex<Vec<ServerId>>,
    fail_allocations: std::sync::atomic::AtomicBool,
}

impl MockProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent allocations fail until cleared
    pub fn fail_allocations(&self, fail: bool) {
        self.fail_allocations
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Match ids of all allocation requests seen (for testing)
    pub fn allocation_requests(&self) -> Vec<MatchId> {
        self.allocations
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Server ids of all release requests seen (for testing)
    pub fn release_requests(&self) -> Vec<ServerId> {
        self.releases
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Provisioner for MockProvisioner {
    async fn allocate(&self, request: AllocationRequest) -> Result<ProvisionedServer> {
        if let Ok(mut calls) = self.allocations.lock() {
            calls.push(request.match_id);
        }

        if self.fail_allocations.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(MatchmakingError::ProvisioningFailed {
                reason: format!("mock allocation failure for match {}", request.match_id),
            }
            .into());
        }

        Ok(ProvisionedServer {
            server_id: generate_server_id(),
            address: "127.0.0.1:7777".to_string(),
        })
    }

    async fn release(&self, server_id: ServerId) -> Result<()> {
        if let Ok(mut calls) = self.releases.lock() {
            calls.push(server_id);
        }
        Ok(())
    }
}
