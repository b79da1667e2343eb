//! Synth and deploy commands.

use super::{Overrides, load};
use anyhow::{Context, Result};
use sitepipe_core::ProvisioningEngine;
use sitepipe_deployer::{DeploymentOrchestrator, DeploymentRequest, ManifestEngine};
use std::path::Path;
use std::sync::Arc;

/// Print the deployment unit, optionally writing its manifest.
///
/// No hosted zone lookup happens here.
pub async fn synth(config: &Path, overrides: &Overrides, out: Option<&Path>) -> Result<()> {
    let loaded = load(config, overrides)?;
    let unit = loaded.plan()?;

    println!("{}", unit.to_json()?);

    if let Some(out) = out {
        let receipt = ManifestEngine::new(out)
            .submit(&unit)
            .await
            .with_context(|| format!("Failed to write manifest into {}", out.display()))?;
        eprintln!("Wrote {} ({})", receipt.location, receipt.status);
    }
    Ok(())
}

/// Deploy through the manifest engine.
pub async fn deploy(config: &Path, overrides: &Overrides, out: &Path) -> Result<()> {
    let loaded = load(config, overrides)?;

    let engine = loaded
        .site
        .zones
        .iter()
        .fold(ManifestEngine::new(out), |engine, zone| {
            engine.with_zone(&zone.name, &zone.id)
        });
    let orchestrator = DeploymentOrchestrator::new(Arc::new(engine));

    let environment = loaded.settings.environment.clone();
    let request = DeploymentRequest {
        naming: loaded.site.naming_for(&environment),
        pipeline: loaded.site.pipeline_settings(),
        target: loaded.settings.target(),
        environment,
    };

    let receipt = orchestrator
        .deploy(&request)
        .await
        .with_context(|| format!("Failed to deploy environment '{}'", request.environment))?;

    println!("Unit:        {}", receipt.unit_name);
    println!("Status:      {}", receipt.status);
    println!("Location:    {}", receipt.location);
    println!("Fingerprint: {}", receipt.fingerprint);
    Ok(())
}
