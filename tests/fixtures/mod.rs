//! Test fixtures and mock implementations for integration testing

use async_trait::async_trait;
use rally_point::config::MatchmakingSettings;
use rally_point::error::{MatchmakingError, Result};
use rally_point::matchmaker::MatchEngine;
use rally_point::provision::{
    AllocationRequest, MockProvisioner, ProvisionedServer, Provisioner,
};
use rally_point::types::{ServerId, SessionId};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Settings mirroring the production defaults, shared by every scenario.
pub fn test_settings() -> MatchmakingSettings {
    MatchmakingSettings {
        session_ttl_seconds: 300,
        pairing_interval_seconds: 10,
        eligibility_margin_seconds: 50,
        expiry_sweep_interval_seconds: 1,
    }
}

/// Engine wired to a recording mock provisioner.
pub fn create_test_engine() -> (Arc<MatchEngine>, Arc<MockProvisioner>) {
    let provisioner = Arc::new(MockProvisioner::new());
    let engine = MatchEngine::new(test_settings(), provisioner.clone());
    (engine, provisioner)
}

/// Connect `count` sessions and put them all in the queue, in order.
pub fn connect_and_queue(engine: &Arc<MatchEngine>, count: usize) -> Vec<SessionId> {
    (0..count)
        .map(|_| {
            let session = engine.connect().expect("connect never fails");
            engine.join_queue(session.id).expect("fresh session joins");
            session.id
        })
        .collect()
}

/// Provisioner whose allocations block until the test opens the gate.
///
/// Lets a test hold a match in the provisioning state deterministically,
/// e.g. to end it while the server is still spinning up.
pub struct GatedProvisioner {
    gate: Semaphore,
    inner: MockProvisioner,
}

impl GatedProvisioner {
    pub fn new() -> Self {
        Self {
            gate: Semaphore::new(0),
            inner: MockProvisioner::new(),
        }
    }

    /// Allow `count` pending or future allocations to proceed.
    pub fn open(&self, count: usize) {
        self.gate.add_permits(count);
    }

    pub fn release_requests(&self) -> Vec<ServerId> {
        self.inner.release_requests()
    }
}

#[async_trait]
impl Provisioner for GatedProvisioner {
    async fn allocate(&self, request: AllocationRequest) -> Result<ProvisionedServer> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| MatchmakingError::ProvisioningFailed {
                reason: "allocation gate closed".to_string(),
            })?;
        permit.forget();

        self.inner.allocate(request).await
    }

    async fn release(&self, server_id: ServerId) -> Result<()> {
        self.inner.release(server_id).await
    }
}
