//! Plan runner - walks a pipeline plan's stages in order.

use futures::future::join_all;
use sitepipe_core::executor::ActionExecutor;
use sitepipe_core::pipeline::{Action, ApplicationDeployment, PipelinePlan, Stage, StageBody};
use sitepipe_core::{Error, LogicalId, ResourceId, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

/// State of a stage during execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageState {
    Pending,
    Running,
    Succeeded,
    Failed { message: String },
    Skipped { reason: String },
}

impl StageState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StageState::Succeeded | StageState::Failed { .. } | StageState::Skipped { .. }
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StageState::Succeeded)
    }
}

/// Event emitted during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    StageStarted { stage: String },
    ActionStarted { stage: String, action: String },
    ActionCompleted { stage: String, action: String, success: bool },
    ResourceProvisioned { stage: String, resource: LogicalId },
    StageCompleted { stage: String, success: bool },
    StageSkipped { stage: String, reason: String },
    PipelineCompleted { success: bool },
}

/// Result of a run.
#[derive(Debug)]
pub struct RunResult {
    pub run_id: ResourceId,
    pub success: bool,
    pub stage_states: HashMap<String, StageState>,
}

impl RunResult {
    pub fn state(&self, stage: &str) -> Option<&StageState> {
        self.stage_states.get(stage)
    }
}

/// Runs pipeline plans against an executor.
pub struct PlanRunner {
    executor: Arc<dyn ActionExecutor>,
}

impl PlanRunner {
    pub fn new(executor: Arc<dyn ActionExecutor>) -> Self {
        Self { executor }
    }

    /// Execute a plan, returning a channel of events and a handle to get the final result.
    ///
    /// Stages run strictly in plan order. A failed stage halts the run and
    /// every stage after it is skipped.
    pub fn execute(
        &self,
        plan: &PipelinePlan,
    ) -> (mpsc::Receiver<PipelineEvent>, tokio::task::JoinHandle<RunResult>) {
        let (tx, rx) = mpsc::channel(100);
        let executor = self.executor.clone();
        let plan = plan.clone();

        let handle = tokio::spawn(async move { Self::execute_inner(executor, plan, tx).await });

        (rx, handle)
    }

    async fn execute_inner(
        executor: Arc<dyn ActionExecutor>,
        plan: PipelinePlan,
        tx: mpsc::Sender<PipelineEvent>,
    ) -> RunResult {
        let run_id = ResourceId::new();
        let mut stage_states: HashMap<String, StageState> = plan
            .stages
            .iter()
            .map(|s| (s.name.clone(), StageState::Pending))
            .collect();

        info!(%run_id, pipeline = %plan.name, executor = executor.name(), "Starting run");

        let mut halted_by: Option<String> = None;

        for stage in &plan.stages {
            if let Some(failed) = &halted_by {
                let reason = format!("stage '{failed}' failed");
                info!(stage = %stage.name, %reason, "Skipping stage");
                let _ = tx
                    .send(PipelineEvent::StageSkipped {
                        stage: stage.name.clone(),
                        reason: reason.clone(),
                    })
                    .await;
                stage_states.insert(stage.name.clone(), StageState::Skipped { reason });
                continue;
            }

            stage_states.insert(stage.name.clone(), StageState::Running);
            let _ = tx
                .send(PipelineEvent::StageStarted {
                    stage: stage.name.clone(),
                })
                .await;

            match Self::execute_stage(&executor, stage, &tx).await {
                Ok(()) => {
                    info!(stage = %stage.name, "Stage completed successfully");
                    stage_states.insert(stage.name.clone(), StageState::Succeeded);
                    let _ = tx
                        .send(PipelineEvent::StageCompleted {
                            stage: stage.name.clone(),
                            success: true,
                        })
                        .await;
                }
                Err(e) => {
                    error!(stage = %stage.name, error = %e, "Stage failed");
                    stage_states.insert(
                        stage.name.clone(),
                        StageState::Failed {
                            message: e.to_string(),
                        },
                    );
                    let _ = tx
                        .send(PipelineEvent::StageCompleted {
                            stage: stage.name.clone(),
                            success: false,
                        })
                        .await;
                    halted_by = Some(stage.name.clone());
                }
            }
        }

        let success = halted_by.is_none();
        let _ = tx.send(PipelineEvent::PipelineCompleted { success }).await;
        info!(%run_id, success, "Run finished");

        RunResult {
            run_id,
            success,
            stage_states,
        }
    }

    async fn execute_stage(
        executor: &Arc<dyn ActionExecutor>,
        stage: &Stage,
        tx: &mpsc::Sender<PipelineEvent>,
    ) -> Result<()> {
        match &stage.body {
            StageBody::Actions(_) => Self::execute_actions(executor, stage, tx).await,
            StageBody::Application(app) => {
                Self::execute_application(executor, &stage.name, app, tx).await
            }
        }
    }

    /// Actions sharing a run order start together; a failing group stops
    /// later groups from starting.
    async fn execute_actions(
        executor: &Arc<dyn ActionExecutor>,
        stage: &Stage,
        tx: &mpsc::Sender<PipelineEvent>,
    ) -> Result<()> {
        for run_order in stage.run_orders() {
            let group: Vec<&Action> = stage
                .actions()
                .iter()
                .filter(|a| a.run_order == run_order)
                .collect();

            let results = join_all(
                group
                    .iter()
                    .map(|action| Self::execute_action(executor, &stage.name, action, tx)),
            )
            .await;

            if let Some(err) = results.into_iter().find_map(|r| r.err()) {
                return Err(err);
            }
        }
        Ok(())
    }

    async fn execute_action(
        executor: &Arc<dyn ActionExecutor>,
        stage: &str,
        action: &Action,
        tx: &mpsc::Sender<PipelineEvent>,
    ) -> Result<()> {
        info!(
            stage = %stage,
            action = %action.name,
            run_order = action.run_order,
            "Running action"
        );
        let _ = tx
            .send(PipelineEvent::ActionStarted {
                stage: stage.to_string(),
                action: action.name.clone(),
            })
            .await;

        let result = executor
            .run_action(stage, action)
            .await
            .map_err(|e| match e {
                Error::PipelineExecution { .. } => e,
                other => Error::PipelineExecution {
                    stage: stage.to_string(),
                    action: action.name.clone(),
                    message: other.to_string(),
                },
            });

        let _ = tx
            .send(PipelineEvent::ActionCompleted {
                stage: stage.to_string(),
                action: action.name.clone(),
                success: result.is_ok(),
            })
            .await;

        result
    }

    async fn execute_application(
        executor: &Arc<dyn ActionExecutor>,
        stage: &str,
        app: &ApplicationDeployment,
        tx: &mpsc::Sender<PipelineEvent>,
    ) -> Result<()> {
        for node in app.topology.submission_order() {
            info!(
                stage = %stage,
                stack = %app.stack_name,
                resource = %node.id,
                kind = %node.resource.kind(),
                "Provisioning resource"
            );
            executor
                .provision(&app.stack_name, node)
                .await
                .map_err(|e| Error::PipelineExecution {
                    stage: stage.to_string(),
                    action: node.id.to_string(),
                    message: e.to_string(),
                })?;
            let _ = tx
                .send(PipelineEvent::ResourceProvisioned {
                    stage: stage.to_string(),
                    resource: node.id.clone(),
                })
                .await;
        }
        Ok(())
    }
}
