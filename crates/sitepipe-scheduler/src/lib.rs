//! Local rehearsal of sitepipe pipeline plans.
//!
//! Walks a plan's stages in order against an [`ActionExecutor`], running
//! actions that share a run order concurrently and halting on the first
//! failed stage.
//!
//! [`ActionExecutor`]: sitepipe_core::executor::ActionExecutor

pub mod dry_run;
pub mod orchestrator;

pub use dry_run::DryRunExecutor;
pub use orchestrator::{PipelineEvent, PlanRunner, RunResult, StageState};
