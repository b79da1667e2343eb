//! Pipeline plan and stage sequencing.
//!
//! A plan is an ordered list of stages. Stages run one after another; a
//! failed action halts its stage and nothing after it starts. Inside a stage
//! actions run by ascending run order, and actions sharing a run order may
//! run side by side.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::artifact::Artifact;
use crate::environment::ResolvedIdentifiers;
use crate::secret::SecretRef;
use crate::topology::HostingTopology;
use crate::{Error, Result};

pub const SOURCE_STAGE: &str = "Source";
pub const SYNTH_STAGE: &str = "Synth";
pub const PROVISION_STAGE: &str = "Provision";
pub const BUILD_AND_DEPLOY_STAGE: &str = "BuildAndDeploy";

pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_CREDENTIAL: &str = "personal-github-token";
pub const DEFAULT_BUILD_PROJECT: &str = "StaticSiteBuildProject";
pub const DEFAULT_BUILDSPEC: &str = "website/buildspec.yml";
pub const DEFAULT_BUILD_IMAGE: &str = "aws/codebuild/standard:4.0";

/// Commands used to synthesize the infrastructure definitions when the site
/// configuration lists none.
pub fn default_synth_commands() -> Vec<String> {
    [
        "cd ./infrastructure",
        "yarn install --frozen-lockfile",
        "yarn build",
        "yarn cdk synth",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Source and build settings the sequencer needs besides the identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Repository as `owner/name` on the source-control host.
    pub repository: String,
    pub branch: String,
    /// Credential used to authenticate the source fetch.
    pub credential: SecretRef,
    pub synth_commands: Vec<String>,
    pub build_project: String,
    /// Build specification file, relative to the repository root.
    pub buildspec: String,
    pub build_image: String,
}

impl PipelineSettings {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            branch: DEFAULT_BRANCH.to_string(),
            credential: SecretRef::secrets_manager(DEFAULT_CREDENTIAL),
            synth_commands: default_synth_commands(),
            build_project: DEFAULT_BUILD_PROJECT.to_string(),
            buildspec: DEFAULT_BUILDSPEC.to_string(),
            build_image: DEFAULT_BUILD_IMAGE.to_string(),
        }
    }

    fn validate(&self) -> Result<()> {
        let mut parts = self.repository.split('/');
        let well_formed = matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
        );
        if !well_formed {
            return Err(Error::configuration(
                "source repository",
                format!("'{}' must have the form owner/name", self.repository),
            ));
        }
        if self.branch.trim().is_empty() {
            return Err(Error::configuration("source branch", "must not be empty"));
        }
        if self.credential.name().trim().is_empty() {
            return Err(Error::configuration("source credential", "must not be empty"));
        }
        if self.synth_commands.is_empty() {
            return Err(Error::configuration(
                "synth commands",
                "at least one command is required",
            ));
        }
        for (field, value) in [
            ("build project", &self.build_project),
            ("buildspec", &self.buildspec),
            ("build image", &self.build_image),
        ] {
            if value.trim().is_empty() {
                return Err(Error::configuration(field, "must not be empty"));
            }
        }
        Ok(())
    }
}

/// An ordered list of stages under one pipeline name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelinePlan {
    pub name: String,
    pub stages: Vec<Stage>,
}

/// A stage in the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stage {
    pub name: String,
    #[serde(flatten)]
    pub body: StageBody,
}

/// What a stage does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageBody {
    /// Explicit actions ordered by run order.
    Actions(Vec<Action>),
    /// Deploy a hosting topology; ordering comes from its dependency graph.
    Application(ApplicationDeployment),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationDeployment {
    pub stack_name: String,
    pub topology: HostingTopology,
}

/// A single step inside a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    pub name: String,
    /// Position inside the stage, starting at 1.
    pub run_order: u32,
    pub inputs: Vec<Artifact>,
    pub outputs: Vec<Artifact>,
    #[serde(flatten)]
    pub kind: ActionKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ActionKind {
    /// Fetch a branch from the source-control host.
    #[serde(rename = "github_source")]
    GitHubSource {
        repository: String,
        branch: String,
        credential: SecretRef,
    },
    /// Run shell commands in the build service.
    Shell { commands: Vec<String> },
    /// Run the project's build specification in the build service.
    CodeBuild {
        project: String,
        buildspec: String,
        image: String,
    },
    /// Copy the input artifact into a storage bucket.
    StorageDeploy { bucket_name: String, extract: bool },
}

impl Stage {
    pub fn actions(&self) -> &[Action] {
        match &self.body {
            StageBody::Actions(actions) => actions,
            StageBody::Application(_) => &[],
        }
    }

    pub fn application(&self) -> Option<&ApplicationDeployment> {
        match &self.body {
            StageBody::Application(app) => Some(app),
            StageBody::Actions(_) => None,
        }
    }

    /// Run orders used in this stage, ascending.
    pub fn run_orders(&self) -> Vec<u32> {
        self.actions()
            .iter()
            .map(|a| a.run_order)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl PipelinePlan {
    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn stage_index(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.name == name)
    }

    /// Every action paired with its stage, in plan order.
    pub fn actions(&self) -> impl Iterator<Item = (&Stage, &Action)> {
        self.stages
            .iter()
            .flat_map(|s| s.actions().iter().map(move |a| (s, a)))
    }

    pub fn action(&self, stage: &str, action: &str) -> Option<&Action> {
        self.stage(stage)?.actions().iter().find(|a| a.name == action)
    }

    /// The single action writing `artifact`, if any.
    pub fn producer_of(&self, artifact: &Artifact) -> Option<(&Stage, &Action)> {
        self.actions().find(|(_, a)| a.outputs.contains(artifact))
    }

    /// Check the structural invariants of the plan.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidPlan("pipeline name must not be empty".to_string()));
        }

        let mut stage_names = HashSet::new();
        let mut available: HashSet<&Artifact> = HashSet::new();
        let mut provisioned_buckets: HashSet<&str> = HashSet::new();

        for stage in &self.stages {
            if !stage_names.insert(stage.name.as_str()) {
                return Err(Error::InvalidPlan(format!(
                    "stage '{}' declared more than once",
                    stage.name
                )));
            }

            match &stage.body {
                StageBody::Application(app) => {
                    if app.stack_name.trim().is_empty() {
                        return Err(Error::InvalidPlan(format!(
                            "stage '{}' deploys an unnamed stack",
                            stage.name
                        )));
                    }
                    if let Some(storage) = app.topology.storage() {
                        provisioned_buckets.insert(storage.bucket_name.as_str());
                    }
                }
                StageBody::Actions(actions) => {
                    let mut produced_here: HashMap<&Artifact, u32> = HashMap::new();
                    let mut action_names = HashSet::new();

                    for action in actions {
                        if action.run_order == 0 {
                            return Err(Error::InvalidPlan(format!(
                                "action '{}' in stage '{}' has run order 0; run orders start at 1",
                                action.name, stage.name
                            )));
                        }
                        if !action_names.insert(action.name.as_str()) {
                            return Err(Error::InvalidPlan(format!(
                                "action '{}' declared more than once in stage '{}'",
                                action.name, stage.name
                            )));
                        }
                        for output in &action.outputs {
                            if available.contains(output)
                                || produced_here.insert(output, action.run_order).is_some()
                            {
                                return Err(Error::InvalidPlan(format!(
                                    "artifact '{}' has more than one producer",
                                    output
                                )));
                            }
                        }
                    }

                    for action in actions {
                        for input in &action.inputs {
                            let ready = available.contains(input)
                                || produced_here
                                    .get(input)
                                    .is_some_and(|&order| order < action.run_order);
                            if !ready {
                                return Err(Error::InvalidPlan(format!(
                                    "action '{}' in stage '{}' consumes artifact '{}' before it is produced",
                                    action.name, stage.name, input
                                )));
                            }
                        }
                        if let ActionKind::StorageDeploy { bucket_name, .. } = &action.kind {
                            if !provisioned_buckets.contains(bucket_name.as_str()) {
                                return Err(Error::InvalidPlan(format!(
                                    "action '{}' deploys to bucket '{}' which no earlier stage provisions",
                                    action.name, bucket_name
                                )));
                            }
                        }
                    }

                    available.extend(produced_here.into_keys());
                }
            }
        }

        Ok(())
    }
}

/// Lay out the pipeline for one environment.
///
/// The deploy action targets the bucket declared by `topology`, and the
/// provision stage carrying that topology is placed before it.
pub fn sequence(
    ids: &ResolvedIdentifiers,
    topology: &HostingTopology,
    settings: &PipelineSettings,
) -> Result<PipelinePlan> {
    settings.validate()?;

    let storage = topology
        .storage()
        .ok_or_else(|| Error::InvalidTopology("topology declares no storage".to_string()))?;
    if storage.bucket_name != ids.hosting_bucket_name() {
        return Err(Error::InvalidTopology(format!(
            "topology bucket '{}' does not match resolved bucket '{}'",
            storage.bucket_name,
            ids.hosting_bucket_name()
        )));
    }

    let source = Artifact::source();
    let synth = Artifact::synth();
    let website = Artifact::website();

    let plan = PipelinePlan {
        name: ids.pipeline_name().to_string(),
        stages: vec![
            Stage {
                name: SOURCE_STAGE.to_string(),
                body: StageBody::Actions(vec![Action {
                    name: "Checkout".to_string(),
                    run_order: 1,
                    inputs: vec![],
                    outputs: vec![source.clone()],
                    kind: ActionKind::GitHubSource {
                        repository: settings.repository.clone(),
                        branch: settings.branch.clone(),
                        credential: settings.credential.clone(),
                    },
                }]),
            },
            Stage {
                name: SYNTH_STAGE.to_string(),
                body: StageBody::Actions(vec![Action {
                    name: "Synth".to_string(),
                    run_order: 1,
                    inputs: vec![source.clone()],
                    outputs: vec![synth],
                    kind: ActionKind::Shell {
                        commands: settings.synth_commands.clone(),
                    },
                }]),
            },
            Stage {
                name: PROVISION_STAGE.to_string(),
                body: StageBody::Application(ApplicationDeployment {
                    stack_name: ids.stack_name().to_string(),
                    topology: topology.clone(),
                }),
            },
            Stage {
                name: BUILD_AND_DEPLOY_STAGE.to_string(),
                body: StageBody::Actions(vec![
                    Action {
                        name: "Build".to_string(),
                        run_order: 1,
                        inputs: vec![source],
                        outputs: vec![website.clone()],
                        kind: ActionKind::CodeBuild {
                            project: settings.build_project.clone(),
                            buildspec: settings.buildspec.clone(),
                            image: settings.build_image.clone(),
                        },
                    },
                    Action {
                        name: "Deploy".to_string(),
                        run_order: 2,
                        inputs: vec![website],
                        outputs: vec![],
                        kind: ActionKind::StorageDeploy {
                            bucket_name: storage.bucket_name.clone(),
                            extract: true,
                        },
                    },
                ]),
            },
        ],
    };

    plan.validate()?;
    Ok(plan)
}
