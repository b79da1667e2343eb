//! CLI command implementations.

pub mod deploy;
pub mod rehearse;

use anyhow::{Context, Result};
use sitepipe_config::{DeploySettings, SiteConfig, VariableContext, load_site};
use sitepipe_core::DeploymentUnit;
use std::path::Path;
use tracing::info;

/// Settings given on the command line; each one beats the process environment.
#[derive(Debug, Default)]
pub struct Overrides {
    pub environment: Option<String>,
    pub account: Option<String>,
    pub region: Option<String>,
}

impl Overrides {
    fn apply(&self, mut settings: DeploySettings) -> DeploySettings {
        if let Some(environment) = &self.environment {
            settings = settings.with_environment(environment);
        }
        if let Some(account) = &self.account {
            settings = settings.with_account(account);
        }
        if let Some(region) = &self.region {
            settings = settings.with_region(region);
        }
        settings
    }
}

/// Settings and site configuration for one invocation.
pub struct Loaded {
    pub settings: DeploySettings,
    pub site: SiteConfig,
}

impl Loaded {
    /// Build the deployment unit without consulting any engine.
    pub fn plan(&self) -> Result<DeploymentUnit> {
        let env = &self.settings.environment;
        let unit = DeploymentUnit::plan(
            env,
            &self.site.naming_for(env),
            &self.site.pipeline_settings(),
            self.settings.target(),
        )
        .with_context(|| format!("Failed to plan environment '{env}'"))?;
        Ok(unit)
    }
}

pub fn load(config: &Path, overrides: &Overrides) -> Result<Loaded> {
    let settings = overrides.apply(DeploySettings::from_process_env());

    let mut vars = VariableContext::from_settings(&settings);
    vars.populate_env();

    let site = load_site(config, &vars)
        .with_context(|| format!("Failed to load site config: {}", config.display()))?;
    info!(
        config = %config.display(),
        service = %site.service,
        environment = %settings.environment,
        "Loaded site configuration"
    );

    Ok(Loaded { settings, site })
}

pub fn resolve(config: &Path, overrides: &Overrides) -> Result<()> {
    let loaded = load(config, overrides)?;
    let env = &loaded.settings.environment;
    let identifiers = sitepipe_core::resolve(env, &loaded.site.naming_for(env))?;
    println!("{}", serde_json::to_string_pretty(&identifiers)?);
    Ok(())
}

pub fn validate(config: &Path, overrides: &Overrides) -> Result<()> {
    let loaded = load(config, overrides)?;
    let unit = loaded.plan()?;
    println!(
        "Configuration is valid: {} ({} stages, {} resources)",
        unit.name,
        unit.pipeline.stages.len(),
        unit.pipeline
            .stages
            .iter()
            .filter_map(|s| s.application())
            .map(|app| app.topology.resources().len())
            .sum::<usize>()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_beat_process_settings() {
        let base = DeploySettings::from_lookup(|key: &str| match key {
            "DEPLOY_ENV" => Some("qa".to_string()),
            "AWS_DEFAULT_REGION" => Some("eu-west-1".to_string()),
            _ => None,
        });
        let overrides = Overrides {
            environment: Some("prod".to_string()),
            account: Some("123456789012".to_string()),
            region: None,
        };

        let settings = overrides.apply(base);
        assert_eq!(settings.environment, "prod");
        assert_eq!(settings.account.as_deref(), Some("123456789012"));
        assert_eq!(settings.region.as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn test_no_overrides_keep_settings() {
        let settings = Overrides::default().apply(DeploySettings::default());
        assert_eq!(settings, DeploySettings::default());
    }
}
