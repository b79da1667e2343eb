//! Site configuration parsing (`sitepipe.kdl`).

use crate::variables::VariableContext;
use crate::{ConfigError, ConfigResult};
use kdl::{KdlDocument, KdlNode};
use sitepipe_core::SiteNaming;
use sitepipe_core::pipeline::{
    DEFAULT_BRANCH, DEFAULT_BUILD_IMAGE, DEFAULT_BUILD_PROJECT, DEFAULT_BUILDSPEC,
    DEFAULT_CREDENTIAL, PipelineSettings, default_synth_commands,
};
use sitepipe_core::secret::SecretRef;
use std::collections::BTreeMap;
use std::path::Path;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "sitepipe.kdl";

/// Parsed site configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    pub service: String,
    pub site: SiteSection,
    pub source: SourceSection,
    pub synth_commands: Vec<String>,
    pub build: BuildSection,
    /// Public zones known to the local manifest engine.
    pub zones: Vec<KnownZone>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteSection {
    pub subdomain: String,
    pub hosted_zone: String,
    /// Explicit hosted zone id per environment.
    pub zone_ids: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSection {
    pub repository: String,
    pub branch: String,
    pub credential: String,
    pub credential_field: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSection {
    pub project: String,
    pub buildspec: String,
    pub image: String,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            project: DEFAULT_BUILD_PROJECT.to_string(),
            buildspec: DEFAULT_BUILDSPEC.to_string(),
            image: DEFAULT_BUILD_IMAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownZone {
    pub name: String,
    pub id: String,
}

impl SiteConfig {
    /// Naming inputs for `environment`, with its explicit zone id if one is
    /// configured.
    pub fn naming_for(&self, environment: &str) -> SiteNaming {
        let naming = SiteNaming::new(&self.service, &self.site.subdomain, &self.site.hosted_zone);
        match self.site.zone_ids.get(environment) {
            Some(id) => naming.with_hosted_zone_id(id),
            None => naming,
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            repository: self.source.repository.clone(),
            branch: self.source.branch.clone(),
            credential: SecretRef::SecretsManager {
                name: self.source.credential.clone(),
                json_field: self.source.credential_field.clone(),
            },
            synth_commands: self.synth_commands.clone(),
            build_project: self.build.project.clone(),
            buildspec: self.build.buildspec.clone(),
            build_image: self.build.image.clone(),
        }
    }
}

/// Read and parse a site configuration file.
pub fn load_site(path: impl AsRef<Path>, vars: &VariableContext) -> ConfigResult<SiteConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_site(&content, vars)
}

/// Parse a site configuration from KDL text.
pub fn parse_site(kdl: &str, vars: &VariableContext) -> ConfigResult<SiteConfig> {
    let doc: KdlDocument = kdl.parse()?;

    let mut service = None;
    let mut site = None;
    let mut source = None;
    let mut synth_commands = None;
    let mut build = None;
    let mut zones = Vec::new();

    for node in doc.nodes() {
        match node.name().value() {
            "service" => {
                let name = get_first_string_arg(node, vars)
                    .ok_or_else(|| ConfigError::MissingField("service name".to_string()))?;
                set_once(&mut service, "service", name)?;
            }
            "site" => set_once(&mut site, "site", parse_site_section(node, vars)?)?,
            "source" => set_once(&mut source, "source", parse_source(node, vars)?)?,
            "synth" => set_once(&mut synth_commands, "synth", parse_synth(node, vars))?,
            "build" => set_once(&mut build, "build", parse_build(node, vars))?,
            "zone" => {
                let name = get_first_string_arg(node, vars)
                    .ok_or_else(|| ConfigError::MissingField("zone name".to_string()))?;
                let id = get_string_prop(node, "id", vars)
                    .ok_or_else(|| ConfigError::MissingField(format!("id for zone '{name}'")))?;
                if zones.iter().any(|z: &KnownZone| z.name == name) {
                    return Err(ConfigError::Duplicate(format!("zone '{name}'")));
                }
                zones.push(KnownZone { name, id });
            }
            _ => {} // Ignore unknown nodes
        }
    }

    let service = service
        .filter(|s: &String| !s.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingField("service".to_string()))?;
    let site = site.ok_or_else(|| ConfigError::MissingField("site".to_string()))?;
    let source = source.ok_or_else(|| ConfigError::MissingField("source".to_string()))?;

    let synth_commands = synth_commands
        .filter(|c: &Vec<String>| !c.is_empty())
        .unwrap_or_else(default_synth_commands);

    Ok(SiteConfig {
        service,
        site,
        source,
        synth_commands,
        build: build.unwrap_or_default(),
        zones,
    })
}

fn set_once<T>(slot: &mut Option<T>, name: &str, value: T) -> ConfigResult<()> {
    if slot.is_some() {
        return Err(ConfigError::Duplicate(format!("'{name}' section")));
    }
    *slot = Some(value);
    Ok(())
}

fn parse_site_section(node: &KdlNode, vars: &VariableContext) -> ConfigResult<SiteSection> {
    let mut subdomain = None;
    let mut hosted_zone = None;
    let mut zone_ids = BTreeMap::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "subdomain" => subdomain = get_first_string_arg(child, vars),
                "hosted-zone" | "hosted_zone" => hosted_zone = get_first_string_arg(child, vars),
                "zone-id" | "zone_id" => {
                    let args = get_all_string_args(child, vars);
                    let [environment, id] = args.as_slice() else {
                        return Err(ConfigError::InvalidValue {
                            field: "site.zone-id".to_string(),
                            message: "expected an environment and a zone id".to_string(),
                        });
                    };
                    if zone_ids.insert(environment.clone(), id.clone()).is_some() {
                        return Err(ConfigError::Duplicate(format!(
                            "zone id for environment '{environment}'"
                        )));
                    }
                }
                _ => {}
            }
        }
    }

    Ok(SiteSection {
        subdomain: subdomain
            .ok_or_else(|| ConfigError::MissingField("site.subdomain".to_string()))?,
        hosted_zone: hosted_zone
            .ok_or_else(|| ConfigError::MissingField("site.hosted-zone".to_string()))?,
        zone_ids,
    })
}

fn parse_source(node: &KdlNode, vars: &VariableContext) -> ConfigResult<SourceSection> {
    let mut repository = None;
    let mut branch = DEFAULT_BRANCH.to_string();
    let mut credential = DEFAULT_CREDENTIAL.to_string();
    let mut credential_field = None;

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "repository" => repository = get_first_string_arg(child, vars),
                "branch" => {
                    if let Some(b) = get_first_string_arg(child, vars) {
                        branch = b;
                    }
                }
                "credential" => {
                    if let Some(c) = get_first_string_arg(child, vars) {
                        credential = c;
                    }
                    credential_field = get_string_prop(child, "field", vars);
                }
                _ => {}
            }
        }
    }

    Ok(SourceSection {
        repository: repository
            .ok_or_else(|| ConfigError::MissingField("source.repository".to_string()))?,
        branch,
        credential,
        credential_field,
    })
}

fn parse_synth(node: &KdlNode, vars: &VariableContext) -> Vec<String> {
    let mut commands = Vec::new();
    if let Some(children) = node.children() {
        for child in children.nodes() {
            if child.name().value() == "run" {
                if let Some(cmd) = get_first_string_arg(child, vars) {
                    commands.push(cmd);
                }
            }
        }
    }
    commands
}

fn parse_build(node: &KdlNode, vars: &VariableContext) -> BuildSection {
    let mut build = BuildSection::default();
    if let Some(children) = node.children() {
        for child in children.nodes() {
            let Some(value) = get_first_string_arg(child, vars) else {
                continue;
            };
            match child.name().value() {
                "project" => build.project = value,
                "buildspec" => build.buildspec = value,
                "image" => build.image = value,
                _ => {}
            }
        }
    }
    build
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode, vars: &VariableContext) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| vars.interpolate(s))
}

fn get_all_string_args(node: &KdlNode, vars: &VariableContext) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| vars.interpolate(s))
        .collect()
}

fn get_string_prop(node: &KdlNode, name: &str, vars: &VariableContext) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| vars.interpolate(s))
}
