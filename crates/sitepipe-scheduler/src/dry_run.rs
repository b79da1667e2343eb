//! Dry-run executor that records what a run would do.

use async_trait::async_trait;
use sitepipe_core::executor::ActionExecutor;
use sitepipe_core::pipeline::{Action, ActionKind};
use sitepipe_core::topology::ResourceNode;
use sitepipe_core::{Error, Result};
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Executor that performs nothing and succeeds unless told otherwise.
///
/// Actions and resources are matched for failure injection by name (the
/// action name, or the resource's logical id).
#[derive(Default)]
pub struct DryRunExecutor {
    failing: HashSet<String>,
    executed: Mutex<Vec<String>>,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the action or resource called `name` fail.
    pub fn with_failure(mut self, name: impl Into<String>) -> Self {
        self.failing.insert(name.into());
        self
    }

    /// `<stage>/<action>` and `<stack>/<resource>` entries, in the order they ran.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    fn record(&self, entry: String) {
        if let Ok(mut executed) = self.executed.lock() {
            executed.push(entry);
        }
    }
}

fn describe(kind: &ActionKind) -> String {
    match kind {
        ActionKind::GitHubSource {
            repository,
            branch,
            credential,
        } => format!("checkout {repository}@{branch} with {credential}"),
        ActionKind::Shell { commands } => format!("{} shell command(s)", commands.len()),
        ActionKind::CodeBuild {
            project, buildspec, ..
        } => format!("build {project} using {buildspec}"),
        ActionKind::StorageDeploy { bucket_name, .. } => format!("copy into {bucket_name}"),
    }
}

#[async_trait]
impl ActionExecutor for DryRunExecutor {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    async fn run_action(&self, stage: &str, action: &Action) -> Result<()> {
        self.record(format!("{stage}/{}", action.name));
        debug!(stage = %stage, action = %action.name, "Would {}", describe(&action.kind));

        if self.failing.contains(&action.name) {
            warn!(stage = %stage, action = %action.name, "Injected failure");
            return Err(Error::PipelineExecution {
                stage: stage.to_string(),
                action: action.name.clone(),
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    async fn provision(&self, stack: &str, resource: &ResourceNode) -> Result<()> {
        self.record(format!("{stack}/{}", resource.id));
        debug!(
            stack = %stack,
            resource = %resource.id,
            kind = %resource.resource.kind(),
            "Would provision"
        );

        if self.failing.contains(resource.id.as_str()) {
            warn!(stack = %stack, resource = %resource.id, "Injected failure");
            return Err(Error::Provisioning(format!(
                "injected failure for {}",
                resource.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitepipe_core::artifact::Artifact;
    use sitepipe_core::secret::SecretRef;

    fn action(name: &str) -> Action {
        Action {
            name: name.to_string(),
            run_order: 1,
            inputs: vec![Artifact::source()],
            outputs: vec![Artifact::website()],
            kind: ActionKind::CodeBuild {
                project: "StaticSiteBuildProject".to_string(),
                buildspec: "website/buildspec.yml".to_string(),
                image: "aws/codebuild/standard:4.0".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_records_actions() {
        let executor = DryRunExecutor::new();
        executor.run_action("BuildAndDeploy", &action("Build")).await.unwrap();
        assert_eq!(executor.executed(), vec!["BuildAndDeploy/Build"]);
    }

    #[test]
    fn test_describe_names_credential_reference_only() {
        let kind = ActionKind::GitHubSource {
            repository: "djheru/dealer-manager-ui".to_string(),
            branch: "main".to_string(),
            credential: SecretRef::SecretsManager {
                name: "personal-github-token".to_string(),
                json_field: Some("token".to_string()),
            },
        };
        assert_eq!(
            describe(&kind),
            "checkout djheru/dealer-manager-ui@main with secretsmanager:personal-github-token#token"
        );
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let executor = DryRunExecutor::new().with_failure("Build");
        let err = executor
            .run_action("BuildAndDeploy", &action("Build"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PipelineExecution { action, .. } if action == "Build"));
        assert!(executor.run_action("BuildAndDeploy", &action("Lint")).await.is_ok());
    }
}
