//! Process-level deployment settings.
//!
//! The environment, account and region come from the invoking process. They
//! are read once, through a lookup function, and then passed around
//! explicitly.

use serde::Serialize;
use sitepipe_core::DeploymentTarget;
use sitepipe_core::environment::DEFAULT_ENVIRONMENT;

/// Variables consulted for the environment name, in order.
pub const ENVIRONMENT_VARS: &[&str] = &["SITEPIPE_ENV", "CDK_ENV", "DEPLOY_ENV"];
/// Variables consulted for the account id, in order.
pub const ACCOUNT_VARS: &[&str] = &[
    "SITEPIPE_ACCOUNT",
    "CDK_DEFAULT_ACCOUNT",
    "AWS_DEFAULT_ACCOUNT_ID",
];
/// Variables consulted for the region, in order.
pub const REGION_VARS: &[&str] = &["SITEPIPE_REGION", "CDK_DEFAULT_REGION", "AWS_DEFAULT_REGION"];

/// Settings for one deployment run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploySettings {
    /// Environment name. Not validated here; resolution rejects bad names.
    pub environment: String,
    pub account: Option<String>,
    pub region: Option<String>,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            environment: DEFAULT_ENVIRONMENT.to_string(),
            account: None,
            region: None,
        }
    }
}

impl DeploySettings {
    /// Read settings through `lookup`.
    ///
    /// The environment falls back to `dev` only when no variable is set at
    /// all; a variable set to the empty string is kept so that resolution
    /// reports it. Account and region take the first non-empty value.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = ENVIRONMENT_VARS
            .iter()
            .find_map(|k| lookup(*k))
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());

        let first_non_empty = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| lookup(*k))
                .find(|v| !v.trim().is_empty())
        };

        Self {
            environment,
            account: first_non_empty(ACCOUNT_VARS),
            region: first_non_empty(REGION_VARS),
        }
    }

    /// Read settings from the current process environment.
    pub fn from_process_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn target(&self) -> DeploymentTarget {
        DeploymentTarget {
            account: self.account.clone(),
            region: self.region.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_to_dev() {
        let settings = DeploySettings::from_lookup(lookup_from(&[]));
        assert_eq!(settings, DeploySettings::default());
        assert_eq!(settings.environment, "dev");
    }

    #[test]
    fn test_primary_variable_wins() {
        let settings = DeploySettings::from_lookup(lookup_from(&[
            ("SITEPIPE_ENV", "prod"),
            ("DEPLOY_ENV", "test"),
        ]));
        assert_eq!(settings.environment, "prod");

        let settings = DeploySettings::from_lookup(lookup_from(&[
            ("CDK_ENV", "staging"),
            ("DEPLOY_ENV", "test"),
        ]));
        assert_eq!(settings.environment, "staging");

        let settings = DeploySettings::from_lookup(lookup_from(&[("CDK_ENV", "prod")]));
        assert_eq!(settings.environment, "prod");

        let settings = DeploySettings::from_lookup(lookup_from(&[("DEPLOY_ENV", "test")]));
        assert_eq!(settings.environment, "test");
    }

    #[test]
    fn test_cdk_account_and_region_precede_aws_defaults() {
        let settings = DeploySettings::from_lookup(lookup_from(&[
            ("CDK_DEFAULT_ACCOUNT", "111111111111"),
            ("AWS_DEFAULT_ACCOUNT_ID", "222222222222"),
            ("CDK_DEFAULT_REGION", "us-west-2"),
            ("AWS_DEFAULT_REGION", "eu-west-1"),
        ]));
        assert_eq!(settings.account.as_deref(), Some("111111111111"));
        assert_eq!(settings.region.as_deref(), Some("us-west-2"));

        let settings = DeploySettings::from_lookup(lookup_from(&[
            ("SITEPIPE_REGION", "ap-south-1"),
            ("CDK_DEFAULT_REGION", "us-west-2"),
        ]));
        assert_eq!(settings.region.as_deref(), Some("ap-south-1"));
    }

    #[test]
    fn test_empty_environment_is_kept() {
        let settings = DeploySettings::from_lookup(lookup_from(&[("SITEPIPE_ENV", "")]));
        assert_eq!(settings.environment, "");
    }

    #[test]
    fn test_account_and_region_fall_through_empty_values() {
        let settings = DeploySettings::from_lookup(lookup_from(&[
            ("SITEPIPE_ACCOUNT", ""),
            ("AWS_DEFAULT_ACCOUNT_ID", "123456789012"),
            ("AWS_DEFAULT_REGION", "eu-west-1"),
        ]));
        assert_eq!(settings.account.as_deref(), Some("123456789012"));
        assert_eq!(settings.region.as_deref(), Some("eu-west-1"));

        let target = settings.target();
        assert_eq!(target.account.as_deref(), Some("123456789012"));
    }
}
