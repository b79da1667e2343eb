//! Provisioning backends for sitepipe.
//!
//! Provides:
//! - The deployment orchestrator
//! - A manifest engine that writes deployment units to disk

pub mod manifest;
pub mod orchestrator;

pub use manifest::ManifestEngine;
pub use orchestrator::{DeploymentOrchestrator, DeploymentRequest};
pub use sitepipe_core::deployer::{
    DeploymentTarget, DeploymentUnit, HostedZone, ProvisioningEngine, SubmissionReceipt,
    SubmissionStatus,
};
