//! Server provisioning integration for the matchmaking engine
//!
//! This module defines the asynchronous contract the engine consumes to
//! allocate and release the compute resource backing a running match, plus
//! the in-process implementations shipped with the crate.

pub mod provisioner;

// Re-export commonly used types
pub use provisioner::{
    AllocationRequest, MockProvisioner, ProvisionedServer, Provisioner, StaticProvisioner,
    StaticProvisionerConfig,
};
