//! Core domain types for sitepipe.
//!
//! This crate contains:
//! - Environment resolution and derived identifiers
//! - The hosting topology graph
//! - Pipeline plans and the stage sequencer
//! - Deployment units and the provisioning engine trait
//! - The executor trait used to rehearse plans

pub mod artifact;
pub mod deployer;
pub mod environment;
pub mod error;
pub mod executor;
pub mod id;
pub mod pipeline;
pub mod secret;
pub mod topology;

pub use deployer::{DeploymentTarget, DeploymentUnit, ProvisioningEngine};
pub use environment::{ResolvedIdentifiers, SiteNaming, resolve};
pub use error::{Error, Result};
pub use id::{LogicalId, ResourceId};
