//! Deployment units and the provisioning engine seam.
//!
//! The core never talks to a cloud itself. It composes a [`DeploymentUnit`]
//! and hands it to a [`ProvisioningEngine`], which owns waiting, retries and
//! the actual resource creation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::Result;
use crate::environment::{ResolvedIdentifiers, SiteNaming, resolve};
use crate::pipeline::{PipelinePlan, PipelineSettings, sequence};
use crate::topology;

/// Account and region the unit is deployed into. Passed through unvalidated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeploymentTarget {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// One named, fully formed deployment: the pipeline with the hosting
/// topology nested in its provision stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentUnit {
    pub name: String,
    pub target: DeploymentTarget,
    pub identifiers: ResolvedIdentifiers,
    pub pipeline: PipelinePlan,
}

impl DeploymentUnit {
    /// Build the topology and pipeline for already resolved identifiers.
    pub fn compose(
        identifiers: ResolvedIdentifiers,
        settings: &PipelineSettings,
        target: DeploymentTarget,
    ) -> Result<Self> {
        let topology = topology::build(&identifiers)?;
        let pipeline = sequence(&identifiers, &topology, settings)?;
        Ok(Self {
            name: identifiers.stack_name().to_string(),
            target,
            identifiers,
            pipeline,
        })
    }

    /// Resolve `environment` and compose the unit in one step.
    pub fn plan(
        environment: &str,
        naming: &SiteNaming,
        settings: &PipelineSettings,
        target: DeploymentTarget,
    ) -> Result<Self> {
        let identifiers = resolve(environment, naming)?;
        Self::compose(identifiers, settings, target)
    }

    /// Canonical JSON form handed to engines.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| crate::Error::Internal(format!("failed to serialize unit: {e}")))
    }
}

/// A public hosted zone known to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostedZone {
    pub id: String,
    pub name: String,
}

/// What happened to a submitted unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    /// First submission under this name.
    Created,
    /// A different unit existed under this name and was replaced.
    Updated,
    /// The identical unit was already submitted.
    Unchanged,
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmissionStatus::Created => write!(f, "created"),
            SubmissionStatus::Updated => write!(f, "updated"),
            SubmissionStatus::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Receipt returned by an engine after accepting a unit.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReceipt {
    pub unit_name: String,
    pub engine: String,
    pub status: SubmissionStatus,
    /// Engine-specific location of the submitted unit.
    pub location: String,
    /// Content fingerprint of the unit as submitted.
    pub fingerprint: String,
    pub submitted_at: DateTime<Utc>,
}

/// The external provisioning engine.
#[async_trait]
pub trait ProvisioningEngine: Send + Sync {
    /// Name of this engine.
    fn name(&self) -> &'static str;

    /// Find a public hosted zone by name.
    async fn lookup_zone(&self, zone_name: &str) -> Result<Option<HostedZone>>;

    /// Submit a deployment unit. Rejections are returned as
    /// [`crate::Error::Provisioning`].
    async fn submit(&self, unit: &DeploymentUnit) -> Result<SubmissionReceipt>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PROVISION_STAGE;

    #[test]
    fn test_plan_composes_named_unit() {
        let unit = DeploymentUnit::plan(
            "dev",
            &SiteNaming::new("dealer-manager-ui", "dealers", "example.net"),
            &PipelineSettings::new("djheru/dealer-manager-ui"),
            DeploymentTarget {
                account: Some("123456789012".to_string()),
                region: Some("eu-west-1".to_string()),
            },
        )
        .unwrap();

        assert_eq!(unit.name, "DealerManagerUiDev");
        assert_eq!(unit.pipeline.name, "dealer-manager-ui-dev");
        assert_eq!(unit.target.account.as_deref(), Some("123456789012"));
        assert!(unit.pipeline.stage(PROVISION_STAGE).is_some());
    }

    #[test]
    fn test_empty_environment_fails_before_composition() {
        let err = DeploymentUnit::plan(
            "",
            &SiteNaming::new("svc", "dealers", "example.net"),
            &PipelineSettings::new("o/r"),
            DeploymentTarget::default(),
        )
        .unwrap_err();
        assert!(matches!(err, crate::Error::Configuration { .. }));
        assert!(err.is_preflight());
    }

    #[test]
    fn test_json_is_stable() {
        let make = || {
            DeploymentUnit::plan(
                "prod",
                &SiteNaming::new("svc", "dealers", "example.net"),
                &PipelineSettings::new("o/r"),
                DeploymentTarget::default(),
            )
            .unwrap()
        };
        let json = make().to_json().unwrap();
        assert_eq!(json, make().to_json().unwrap());
        assert!(!json.contains("\"account\""));
        assert!(json.contains("\"domain_name\": \"dealers.example.net\""));
    }
}
