//! Manifest engine: emits deployment units as JSON files.
//!
//! Each unit lands in `<out_dir>/<unit name>.json`. The file content is the
//! canonical JSON of the unit, so identical plans produce identical files and
//! re-submitting one is a no-op.

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use sitepipe_core::deployer::{HostedZone, SubmissionReceipt, SubmissionStatus};
use sitepipe_core::{DeploymentUnit, Error, ProvisioningEngine, Result};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Provisioning engine writing manifests to a directory.
pub struct ManifestEngine {
    out_dir: PathBuf,
    zones: Vec<HostedZone>,
}

impl ManifestEngine {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            zones: Vec::new(),
        }
    }

    /// Register a public zone the engine can find by name.
    pub fn with_zone(mut self, name: impl Into<String>, id: impl Into<String>) -> Self {
        self.zones.push(HostedZone {
            id: id.into(),
            name: name.into(),
        });
        self
    }

    /// Path the manifest for `unit_name` is written to.
    pub fn manifest_path(&self, unit_name: &str) -> PathBuf {
        self.out_dir.join(format!("{unit_name}.json"))
    }
}

/// Hex-encoded SHA-256 of a manifest body.
pub fn fingerprint(body: &str) -> String {
    hex::encode(Sha256::digest(body.as_bytes()))
}

fn existing_environment(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value["identifiers"]["environment"]
        .as_str()
        .map(str::to_string)
}

#[async_trait]
impl ProvisioningEngine for ManifestEngine {
    fn name(&self) -> &'static str {
        "manifest"
    }

    async fn lookup_zone(&self, zone_name: &str) -> Result<Option<HostedZone>> {
        let wanted = zone_name.trim_end_matches('.');
        let zone = self
            .zones
            .iter()
            .find(|z| z.name.trim_end_matches('.') == wanted)
            .cloned();
        debug!(zone = %zone_name, found = zone.is_some(), "Hosted zone lookup");
        Ok(zone)
    }

    async fn submit(&self, unit: &DeploymentUnit) -> Result<SubmissionReceipt> {
        let body = unit.to_json()?;
        let digest = fingerprint(&body);
        let path = self.manifest_path(&unit.name);

        let status = match tokio::fs::read_to_string(&path).await {
            Ok(existing) if fingerprint(&existing) == digest => SubmissionStatus::Unchanged,
            Ok(existing) => {
                let ours = unit.identifiers.environment().as_str();
                match existing_environment(&existing) {
                    Some(theirs) if theirs != ours => {
                        warn!(unit = %unit.name, ours, theirs = %theirs, "Unit name collision");
                        return Err(Error::Provisioning(format!(
                            "unit '{}' already exists for environment '{}'",
                            unit.name, theirs
                        )));
                    }
                    _ => SubmissionStatus::Updated,
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SubmissionStatus::Created,
            Err(e) => {
                return Err(Error::Provisioning(format!(
                    "failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        if status != SubmissionStatus::Unchanged {
            tokio::fs::create_dir_all(&self.out_dir).await.map_err(|e| {
                Error::Provisioning(format!(
                    "failed to create {}: {e}",
                    self.out_dir.display()
                ))
            })?;
            tokio::fs::write(&path, &body).await.map_err(|e| {
                Error::Provisioning(format!("failed to write {}: {e}", path.display()))
            })?;
        }

        info!(unit = %unit.name, %status, path = %path.display(), "Manifest submitted");

        Ok(SubmissionReceipt {
            unit_name: unit.name.clone(),
            engine: self.name().to_string(),
            status,
            location: path.display().to_string(),
            fingerprint: digest,
            submitted_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitepipe_core::pipeline::PipelineSettings;
    use sitepipe_core::{DeploymentTarget, SiteNaming};

    fn unit(env: &str, branch: &str) -> DeploymentUnit {
        let mut settings = PipelineSettings::new("djheru/dealer-manager-ui");
        settings.branch = branch.to_string();
        DeploymentUnit::plan(
            env,
            &SiteNaming::new("dealer-manager-ui", "dealers", "example.net"),
            &settings,
            DeploymentTarget::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_submit_writes_then_reports_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ManifestEngine::new(dir.path().join("out"));

        let first = engine.submit(&unit("dev", "main")).await.unwrap();
        assert_eq!(first.status, SubmissionStatus::Created);
        assert!(engine.manifest_path("DealerManagerUiDev").exists());

        let again = engine.submit(&unit("dev", "main")).await.unwrap();
        assert_eq!(again.status, SubmissionStatus::Unchanged);
        assert_eq!(again.fingerprint, first.fingerprint);
    }

    #[tokio::test]
    async fn test_changed_unit_is_updated() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ManifestEngine::new(dir.path());

        engine.submit(&unit("dev", "main")).await.unwrap();
        let receipt = engine.submit(&unit("dev", "develop")).await.unwrap();
        assert_eq!(receipt.status, SubmissionStatus::Updated);

        let written = std::fs::read_to_string(engine.manifest_path("DealerManagerUiDev")).unwrap();
        assert!(written.contains("\"branch\": \"develop\""));
        assert_eq!(fingerprint(&written), receipt.fingerprint);
    }

    #[tokio::test]
    async fn test_name_collision_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ManifestEngine::new(dir.path());
        let path = engine.manifest_path("DealerManagerUiDev");
        std::fs::write(&path, r#"{"identifiers":{"environment":"other"}}"#).unwrap();

        let err = engine.submit(&unit("dev", "main")).await.unwrap_err();
        assert!(matches!(err, Error::Provisioning(msg) if msg.contains("already exists")));
    }

    #[tokio::test]
    async fn test_lookup_zone_ignores_trailing_dot() {
        let engine = ManifestEngine::new("unused").with_zone("example.net.", "Z1");
        let zone = engine.lookup_zone("example.net").await.unwrap().unwrap();
        assert_eq!(zone.id, "Z1");
        assert!(engine.lookup_zone("example.org").await.unwrap().is_none());
    }
}
