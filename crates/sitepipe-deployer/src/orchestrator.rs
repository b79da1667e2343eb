//! Deployment orchestrator - resolves, composes and submits one unit.

use sitepipe_core::deployer::SubmissionReceipt;
use sitepipe_core::pipeline::PipelineSettings;
use sitepipe_core::{
    DeploymentTarget, DeploymentUnit, Error, ProvisioningEngine, Result, SiteNaming, resolve,
};
use std::sync::Arc;
use tracing::{error, info};

/// Everything needed to deploy one environment of a site.
#[derive(Debug, Clone)]
pub struct DeploymentRequest {
    pub environment: String,
    pub naming: SiteNaming,
    pub pipeline: PipelineSettings,
    pub target: DeploymentTarget,
}

/// Drives a deployment against a provisioning engine.
pub struct DeploymentOrchestrator {
    engine: Arc<dyn ProvisioningEngine>,
}

impl DeploymentOrchestrator {
    pub fn new(engine: Arc<dyn ProvisioningEngine>) -> Self {
        Self { engine }
    }

    /// Resolve identifiers, check the hosted zone exists and compose the
    /// unit. Nothing is submitted.
    pub async fn prepare(&self, request: &DeploymentRequest) -> Result<DeploymentUnit> {
        let identifiers = resolve(&request.environment, &request.naming)?;
        info!(
            environment = %identifiers.environment(),
            domain = %identifiers.domain_name(),
            pipeline = %identifiers.pipeline_name(),
            "Resolved identifiers"
        );

        if identifiers.hosted_zone_id().is_none() {
            let zone_name = identifiers.hosted_zone_name();
            let zone = self.engine.lookup_zone(zone_name).await?;
            match zone {
                Some(zone) => info!(zone = %zone.name, zone_id = %zone.id, "Hosted zone found"),
                None => {
                    error!(zone = %zone_name, engine = self.engine.name(), "Hosted zone not found");
                    return Err(Error::DependencyResolution(format!(
                        "no public hosted zone named '{zone_name}'"
                    )));
                }
            }
        }

        DeploymentUnit::compose(identifiers, &request.pipeline, request.target.clone())
    }

    /// Prepare the unit and submit it.
    pub async fn deploy(&self, request: &DeploymentRequest) -> Result<SubmissionReceipt> {
        let unit = self.prepare(request).await?;

        info!(unit = %unit.name, engine = self.engine.name(), "Submitting deployment unit");
        match self.engine.submit(&unit).await {
            Ok(receipt) => {
                info!(
                    unit = %receipt.unit_name,
                    status = %receipt.status,
                    "Deployment unit accepted"
                );
                Ok(receipt)
            }
            Err(e) => {
                error!(unit = %unit.name, error = %e, "Deployment unit rejected");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use sitepipe_core::deployer::{HostedZone, SubmissionStatus};
    use sitepipe_core::pipeline::{BUILD_AND_DEPLOY_STAGE, PROVISION_STAGE};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingEngine {
        zones: Vec<HostedZone>,
        lookups: Mutex<Vec<String>>,
        submitted: Mutex<Vec<DeploymentUnit>>,
        reject: bool,
    }

    #[async_trait]
    impl ProvisioningEngine for RecordingEngine {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn lookup_zone(&self, zone_name: &str) -> Result<Option<HostedZone>> {
            self.lookups.lock().unwrap().push(zone_name.to_string());
            Ok(self.zones.iter().find(|z| z.name == zone_name).cloned())
        }

        async fn submit(&self, unit: &DeploymentUnit) -> Result<SubmissionReceipt> {
            if self.reject {
                return Err(Error::Provisioning("certificate validation timed out".to_string()));
            }
            self.submitted.lock().unwrap().push(unit.clone());
            Ok(SubmissionReceipt {
                unit_name: unit.name.clone(),
                engine: "recording".to_string(),
                status: SubmissionStatus::Created,
                location: "memory".to_string(),
                fingerprint: String::new(),
                submitted_at: Utc::now(),
            })
        }
    }

    fn engine_with_zone() -> RecordingEngine {
        RecordingEngine {
            zones: vec![HostedZone {
                id: "Z1".to_string(),
                name: "example.net".to_string(),
            }],
            ..Default::default()
        }
    }

    fn request(env: &str) -> DeploymentRequest {
        DeploymentRequest {
            environment: env.to_string(),
            naming: SiteNaming::new("dealer-manager-ui", "dealers", "example.net"),
            pipeline: PipelineSettings::new("djheru/dealer-manager-ui"),
            target: DeploymentTarget {
                account: Some("123456789012".to_string()),
                region: None,
            },
        }
    }

    #[tokio::test]
    async fn test_deploy_submits_single_unit() {
        let engine = Arc::new(engine_with_zone());
        let orchestrator = DeploymentOrchestrator::new(engine.clone());

        let receipt = orchestrator.deploy(&request("dev")).await.unwrap();
        assert_eq!(receipt.unit_name, "DealerManagerUiDev");

        let submitted = engine.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        let unit = &submitted[0];
        assert_eq!(unit.identifiers.domain_name(), "dealers.dev.example.net");
        assert_eq!(unit.target.account.as_deref(), Some("123456789012"));
        assert!(
            unit.pipeline.stage_index(PROVISION_STAGE).unwrap()
                < unit.pipeline.stage_index(BUILD_AND_DEPLOY_STAGE).unwrap()
        );
    }

    #[tokio::test]
    async fn test_missing_zone_fails_before_submission() {
        let engine = Arc::new(RecordingEngine::default());
        let orchestrator = DeploymentOrchestrator::new(engine.clone());

        let err = orchestrator.deploy(&request("dev")).await.unwrap_err();
        assert!(matches!(err, Error::DependencyResolution(_)));
        assert!(engine.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_explicit_zone_id_skips_lookup() {
        let engine = Arc::new(RecordingEngine::default());
        let orchestrator = DeploymentOrchestrator::new(engine.clone());

        let mut req = request("prod");
        req.naming = req.naming.with_hosted_zone_id("ZEXPLICIT");
        orchestrator.deploy(&req).await.unwrap();

        assert!(engine.lookups.lock().unwrap().is_empty());
        assert_eq!(engine.submitted.lock().unwrap()[0].name, "DealerManagerUiProd");
    }

    #[tokio::test]
    async fn test_trailing_dot_zone_is_looked_up_trimmed() {
        let engine = Arc::new(engine_with_zone());
        let orchestrator = DeploymentOrchestrator::new(engine.clone());

        let mut req = request("dev");
        req.naming.hosted_zone_name = "example.net.".to_string();
        let receipt = orchestrator.deploy(&req).await.unwrap();

        assert_eq!(receipt.unit_name, "DealerManagerUiDev");
        assert_eq!(*engine.lookups.lock().unwrap(), vec!["example.net".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_environment_never_reaches_engine() {
        let engine = Arc::new(engine_with_zone());
        let orchestrator = DeploymentOrchestrator::new(engine.clone());

        let err = orchestrator.deploy(&request("")).await.unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(engine.lookups.lock().unwrap().is_empty());
        assert!(engine.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_engine_rejection_is_surfaced_verbatim() {
        let engine = Arc::new(RecordingEngine {
            reject: true,
            ..engine_with_zone()
        });
        let orchestrator = DeploymentOrchestrator::new(engine);

        let err = orchestrator.deploy(&request("dev")).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "provisioning failed: certificate validation timed out"
        );
        assert!(!err.is_preflight());
    }
}
