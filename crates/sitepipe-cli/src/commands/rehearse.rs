//! Local plan rehearsal command.

use super::{Overrides, load};
use anyhow::{Context, Result};
use sitepipe_scheduler::{DryRunExecutor, PipelineEvent, PlanRunner, StageState};
use std::path::Path;
use std::sync::Arc;

/// Walk the plan with a dry-run executor.
pub async fn rehearse(config: &Path, overrides: &Overrides, fail: Vec<String>) -> Result<()> {
    let loaded = load(config, overrides)?;
    let unit = loaded.plan()?;

    println!("Rehearsing pipeline: {}", unit.pipeline.name);
    println!("Stages: {}", unit.pipeline.stages.len());

    let executor = fail
        .into_iter()
        .fold(DryRunExecutor::new(), DryRunExecutor::with_failure);
    let runner = PlanRunner::new(Arc::new(executor));

    println!("\n--- Starting rehearsal ---\n");

    let (mut rx, result_handle) = runner.execute(&unit.pipeline);

    while let Some(event) = rx.recv().await {
        match event {
            PipelineEvent::StageStarted { stage } => {
                println!("▶ Stage '{}' started", stage);
            }
            PipelineEvent::ActionStarted { stage, action } => {
                println!("  [{}] {} ...", stage, action);
            }
            PipelineEvent::ActionCompleted {
                stage,
                action,
                success,
            } => {
                let mark = if success { "ok" } else { "FAILED" };
                println!("  [{}] {} {}", stage, action, mark);
            }
            PipelineEvent::ResourceProvisioned { stage, resource } => {
                println!("  [{}] + {}", stage, resource);
            }
            PipelineEvent::StageCompleted { stage, success } => {
                if success {
                    println!("✓ Stage '{}' completed successfully\n", stage);
                } else {
                    println!("✗ Stage '{}' failed\n", stage);
                }
            }
            PipelineEvent::StageSkipped { stage, reason } => {
                println!("⊘ Stage '{}' skipped: {}\n", stage, reason);
            }
            PipelineEvent::PipelineCompleted { success } => {
                if success {
                    println!("--- Rehearsal completed successfully ---");
                } else {
                    println!("--- Rehearsal failed ---");
                }
            }
        }
    }

    let result = result_handle.await.context("Rehearsal task failed")?;

    println!("\n--- Stage Summary ({}) ---", result.run_id);
    for stage in &unit.pipeline.stages {
        let status = match result.state(&stage.name) {
            Some(StageState::Succeeded) => "✓ succeeded".to_string(),
            Some(StageState::Failed { message }) => format!("✗ failed: {}", message),
            Some(StageState::Skipped { reason }) => format!("⊘ skipped: {}", reason),
            Some(StageState::Running) => "▶ running".to_string(),
            Some(StageState::Pending) | None => "○ pending".to_string(),
        };
        println!("  {} - {}", stage.name, status);
    }

    if result.success {
        println!("\n✓ Rehearsal succeeded!");
        Ok(())
    } else {
        anyhow::bail!("Rehearsal failed");
    }
}
