//! Executor trait for walking a plan's actions.
//!
//! Executors stand in for the build and provisioning services when a plan is
//! rehearsed locally.

use async_trait::async_trait;

use crate::Result;
use crate::pipeline::Action;
use crate::topology::ResourceNode;

/// Trait for action executors.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Name of this executor.
    fn name(&self) -> &'static str;

    /// Run one action of `stage`. A failure halts the stage.
    async fn run_action(&self, stage: &str, action: &Action) -> Result<()>;

    /// Create one resource of `stack`. Called in the topology's submission
    /// order.
    async fn provision(&self, stack: &str, resource: &ResourceNode) -> Result<()>;
}
