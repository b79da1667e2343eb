//! Environment resolution.
//!
//! Maps an environment name onto the full set of names a deployment uses.
//! Everything downstream (bucket, certificate, pipeline, stack) is derived
//! from the values computed here and nowhere else.

use derive_more::Display;
use serde::Serialize;

use crate::{Error, Result};

/// The environment whose domain carries no environment segment.
pub const PRODUCTION: &str = "prod";

/// Environment used when the invoking context names none.
pub const DEFAULT_ENVIRONMENT: &str = "dev";

const MAX_LABEL_LEN: usize = 63;
const MAX_DOMAIN_LEN: usize = 253;
const MIN_BUCKET_LEN: usize = 3;
const MAX_BUCKET_LEN: usize = 63;
const MAX_PIPELINE_NAME_LEN: usize = 100;

/// A validated deployment environment name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Display)]
#[display("{_0}")]
#[serde(transparent)]
pub struct Environment(String);

impl Environment {
    /// Validate an environment name. It must be usable as a single DNS label
    /// without consecutive hyphens, so that every name maps to its own
    /// pipeline and stack name.
    pub fn parse(name: &str) -> Result<Self> {
        validate_label("environment", name)?;
        if name.contains("--") {
            return Err(Error::configuration(
                "environment",
                format!("'{name}' must not contain consecutive '-'"),
            ));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_production(&self) -> bool {
        self.0 == PRODUCTION
    }
}

impl std::str::FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Static naming inputs shared by every environment of one site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteNaming {
    /// Service name the pipeline and stack names are built from.
    pub service: String,
    /// Leftmost part of the site's domain (e.g. "dealers").
    pub subdomain: String,
    /// Public hosted zone the site lives under (e.g. "example.net").
    pub hosted_zone_name: String,
    /// Explicit hosted zone id; when absent the zone is looked up by name.
    pub hosted_zone_id: Option<String>,
}

impl SiteNaming {
    pub fn new(
        service: impl Into<String>,
        subdomain: impl Into<String>,
        hosted_zone_name: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            subdomain: subdomain.into(),
            hosted_zone_name: hosted_zone_name.into(),
            hosted_zone_id: None,
        }
    }

    pub fn with_hosted_zone_id(mut self, id: impl Into<String>) -> Self {
        self.hosted_zone_id = Some(id.into());
        self
    }
}

/// Every name derived for one deployment run. Read-only once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedIdentifiers {
    environment: Environment,
    domain_name: String,
    hosting_bucket_name: String,
    certificate_domain: String,
    pipeline_name: String,
    stack_name: String,
    hosted_zone_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hosted_zone_id: Option<String>,
}

impl ResolvedIdentifiers {
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn domain_name(&self) -> &str {
        &self.domain_name
    }

    pub fn hosting_bucket_name(&self) -> &str {
        &self.hosting_bucket_name
    }

    pub fn certificate_domain(&self) -> &str {
        &self.certificate_domain
    }

    pub fn pipeline_name(&self) -> &str {
        &self.pipeline_name
    }

    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    pub fn hosted_zone_name(&self) -> &str {
        &self.hosted_zone_name
    }

    pub fn hosted_zone_id(&self) -> Option<&str> {
        self.hosted_zone_id.as_deref()
    }
}

/// Resolve the identifiers for `environment`.
///
/// `prod` yields `<subdomain>.<zone>`; every other environment yields
/// `<subdomain>.<environment>.<zone>`.
pub fn resolve(environment: &str, naming: &SiteNaming) -> Result<ResolvedIdentifiers> {
    let environment = Environment::parse(environment)?;
    validate_dns_name("subdomain", &naming.subdomain)?;
    let zone_name = naming
        .hosted_zone_name
        .strip_suffix('.')
        .unwrap_or(&naming.hosted_zone_name);
    validate_dns_name("hosted zone name", zone_name)?;
    if let Some(id) = &naming.hosted_zone_id {
        if id.trim().is_empty() {
            return Err(Error::configuration("hosted zone id", "must not be blank"));
        }
    }

    let domain_name = if environment.is_production() {
        format!("{}.{zone_name}", naming.subdomain)
    } else {
        format!("{}.{environment}.{zone_name}", naming.subdomain)
    };

    if domain_name.len() > MAX_DOMAIN_LEN {
        return Err(Error::configuration(
            "domain name",
            format!("'{domain_name}' exceeds {MAX_DOMAIN_LEN} characters"),
        ));
    }

    // The bucket is named after the domain, so it inherits the domain's
    // character set but has a much tighter length limit.
    let hosting_bucket_name = domain_name.clone();
    if !(MIN_BUCKET_LEN..=MAX_BUCKET_LEN).contains(&hosting_bucket_name.len()) {
        return Err(Error::configuration(
            "hosting bucket name",
            format!(
                "'{hosting_bucket_name}' must be between {MIN_BUCKET_LEN} and {MAX_BUCKET_LEN} characters"
            ),
        ));
    }

    let mut words = name_words(&naming.service);
    if words.is_empty() {
        return Err(Error::configuration(
            "service name",
            format!("'{}' contains no alphanumeric characters", naming.service),
        ));
    }
    words.extend(name_words(environment.as_str()));

    let pipeline_name = words.join("-");
    if pipeline_name.len() > MAX_PIPELINE_NAME_LEN {
        return Err(Error::configuration(
            "pipeline name",
            format!("'{pipeline_name}' exceeds {MAX_PIPELINE_NAME_LEN} characters"),
        ));
    }
    let stack_name = stack_name(&words);

    Ok(ResolvedIdentifiers {
        certificate_domain: domain_name.clone(),
        environment,
        domain_name,
        hosting_bucket_name,
        pipeline_name,
        stack_name,
        hosted_zone_name: zone_name.to_string(),
        hosted_zone_id: naming.hosted_zone_id.clone(),
    })
}

/// Check a single DNS label: 1-63 chars of `[a-z0-9-]`, no leading or
/// trailing hyphen.
pub fn validate_label(input: &str, label: &str) -> Result<()> {
    if label.is_empty() {
        return Err(Error::configuration(input, "must not be empty"));
    }
    if label.len() > MAX_LABEL_LEN {
        return Err(Error::configuration(
            input,
            format!("'{label}' exceeds {MAX_LABEL_LEN} characters"),
        ));
    }
    if let Some(bad) = label
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(Error::configuration(
            input,
            format!(
                "'{label}' contains '{bad}'; only lowercase letters, digits and '-' are allowed"
            ),
        ));
    }
    if label.starts_with('-') || label.ends_with('-') {
        return Err(Error::configuration(
            input,
            format!("'{label}' must not start or end with '-'"),
        ));
    }
    Ok(())
}

/// Check a dotted DNS name label by label.
pub fn validate_dns_name(input: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::configuration(input, "must not be empty"));
    }
    for label in name.split('.') {
        validate_label(input, label)?;
    }
    Ok(())
}

/// Split a name into lowercase words on separators and camelCase humps.
fn name_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in name.chars() {
        if !c.is_ascii_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_ascii_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        current.push(c.to_ascii_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// PascalCase the words. A word after the first that starts with a digit is
/// kept apart with `_`, so `qa-1` and `qa1` stay distinct.
fn stack_name(words: &[String]) -> String {
    words
        .iter()
        .enumerate()
        .map(|(i, w)| {
            if i > 0 && w.starts_with(|c: char| c.is_ascii_digit()) {
                format!("_{w}")
            } else {
                capitalize(w)
            }
        })
        .collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naming() -> SiteNaming {
        SiteNaming::new("dealer-manager-ui", "dealers", "example.net")
    }

    #[test]
    fn test_dev_domain_carries_environment_segment() {
        let ids = resolve("dev", &naming()).unwrap();
        assert_eq!(ids.domain_name(), "dealers.dev.example.net");
        assert_eq!(ids.hosting_bucket_name(), "dealers.dev.example.net");
        assert_eq!(ids.certificate_domain(), "dealers.dev.example.net");
        assert_eq!(ids.hosted_zone_name(), "example.net");
        assert_eq!(ids.hosted_zone_id(), None);
    }

    #[test]
    fn test_prod_domain_has_no_environment_segment() {
        let ids = resolve("prod", &naming()).unwrap();
        assert_eq!(ids.domain_name(), "dealers.example.net");
        assert!(ids.environment().is_production());
    }

    #[test]
    fn test_custom_environments_follow_non_prod_rule() {
        for env in ["test", "staging", "feature-42", "production", "prod2"] {
            let ids = resolve(env, &naming()).unwrap();
            assert_eq!(ids.domain_name(), format!("dealers.{env}.example.net"));
        }
    }

    #[test]
    fn test_pipeline_and_stack_names_are_normalized() {
        let ids = resolve("dev", &naming()).unwrap();
        assert_eq!(ids.pipeline_name(), "dealer-manager-ui-dev");
        assert_eq!(ids.stack_name(), "DealerManagerUiDev");

        let odd = SiteNaming::new("Dealer_Manager  UI", "dealers", "example.net");
        let ids = resolve("dev", &odd).unwrap();
        assert_eq!(ids.pipeline_name(), "dealer-manager-ui-dev");

        let camel = SiteNaming::new("dealerManagerUi", "dealers", "example.net");
        let ids = resolve("qa-1", &camel).unwrap();
        assert_eq!(ids.pipeline_name(), "dealer-manager-ui-qa-1");
        assert_eq!(ids.stack_name(), "DealerManagerUiQa_1");
    }

    #[test]
    fn test_distinct_environments_get_distinct_names() {
        let envs = [
            "qa-1", "qa1", "q-a1", "qa-11", "qa1-1", "qa-1-1", "feature-x", "featurex", "dev",
            "prod", "1-a", "1a",
        ];
        let mut stacks = std::collections::HashSet::new();
        let mut pipelines = std::collections::HashSet::new();
        for env in envs {
            let ids = resolve(env, &naming()).unwrap();
            assert!(stacks.insert(ids.stack_name().to_string()), "{env}: {}", ids.stack_name());
            assert!(pipelines.insert(ids.pipeline_name().to_string()), "{env}");
        }
        assert!(stacks.contains("DealerManagerUiQa1"));
        assert!(stacks.contains("DealerManagerUiQA1"));
        assert!(stacks.contains("DealerManagerUi_1A"));
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let a = resolve("dev", &naming()).unwrap();
        let b = resolve("dev", &naming()).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_vec(&a).unwrap(),
            serde_json::to_vec(&b).unwrap()
        );
    }

    #[test]
    fn test_fully_qualified_zone_name_is_trimmed() {
        let fqdn = SiteNaming::new("dealer-manager-ui", "dealers", "example.net.");
        let ids = resolve("dev", &fqdn).unwrap();
        assert_eq!(ids.domain_name(), "dealers.dev.example.net");
        assert_eq!(ids.hosted_zone_name(), "example.net");
        assert_eq!(ids, resolve("dev", &naming()).unwrap());

        let doubled = SiteNaming::new("svc", "dealers", "example.net..");
        assert!(matches!(
            resolve("dev", &doubled),
            Err(Error::Configuration { ref input, .. }) if input == "hosted zone name"
        ));
    }

    #[test]
    fn test_explicit_zone_id_is_carried() {
        let ids = resolve("prod", &naming().with_hosted_zone_id("Z123")).unwrap();
        assert_eq!(ids.hosted_zone_id(), Some("Z123"));
    }

    #[test]
    fn test_empty_environment_is_a_configuration_error() {
        let err = resolve("", &naming()).unwrap_err();
        match err {
            Error::Configuration { input, .. } => assert_eq!(input, "environment"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_environment_characters_are_rejected() {
        for env in ["Dev", "dev.eu", "dev_1", "-dev", "dev-", "dév", "qa--1"] {
            let err = resolve(env, &naming()).unwrap_err();
            assert!(
                matches!(err, Error::Configuration { ref input, .. } if input == "environment"),
                "{env} should be rejected, got {err}"
            );
        }
    }

    #[test]
    fn test_invalid_zone_and_subdomain_are_rejected() {
        let bad_zone = SiteNaming::new("svc", "dealers", "example..net");
        assert!(matches!(
            resolve("dev", &bad_zone),
            Err(Error::Configuration { ref input, .. }) if input == "hosted zone name"
        ));

        let bad_sub = SiteNaming::new("svc", "", "example.net");
        assert!(matches!(
            resolve("dev", &bad_sub),
            Err(Error::Configuration { ref input, .. }) if input == "subdomain"
        ));
    }

    #[test]
    fn test_bucket_name_length_is_enforced() {
        let long = SiteNaming::new("svc", "a".repeat(40), "b".repeat(30) + ".net");
        let err = resolve("dev", &long).unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration { ref input, .. } if input == "hosting bucket name"
        ));
    }

    #[test]
    fn test_service_without_words_is_rejected() {
        let naming = SiteNaming::new("--", "dealers", "example.net");
        assert!(matches!(
            resolve("dev", &naming),
            Err(Error::Configuration { ref input, .. }) if input == "service name"
        ));
    }
}
