//! Variable interpolation for site configurations.
//!
//! Supports variables like:
//! - `${environment}` - Environment name of the current run
//! - `${account}` - Target account (empty when unset)
//! - `${region}` - Target region (empty when unset)
//! - `${env.VAR_NAME}` - Process environment variable
//!
//! Unknown variables are left untouched.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::settings::DeploySettings;

/// Variables available while reading a site configuration.
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    pub environment: String,
    pub account: Option<String>,
    pub region: Option<String>,
    /// Environment variables
    pub env: HashMap<String, String>,
}

// Regex for matching ${...} variables
static VAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)?)\}")
        .expect("variable pattern is valid")
});

impl VariableContext {
    /// Create a context for the given run settings.
    pub fn from_settings(settings: &DeploySettings) -> Self {
        Self {
            environment: settings.environment.clone(),
            account: settings.account.clone(),
            region: settings.region.clone(),
            env: HashMap::new(),
        }
    }

    /// Populate environment variables from the current process environment.
    pub fn populate_env(&mut self) {
        for (key, value) in std::env::vars() {
            self.env.insert(key, value);
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Resolve a variable name to its value.
    pub fn resolve(&self, var_name: &str) -> Option<String> {
        let parts: Vec<&str> = var_name.split('.').collect();

        match parts.as_slice() {
            ["environment"] => Some(self.environment.clone()),
            ["account"] => Some(self.account.clone().unwrap_or_default()),
            ["region"] => Some(self.region.clone().unwrap_or_default()),
            ["env", name] => self.env.get(*name).cloned(),
            _ => None,
        }
    }

    /// Interpolate all variables in a string.
    pub fn interpolate(&self, input: &str) -> String {
        VAR_REGEX
            .replace_all(input, |caps: &regex::Captures| {
                let var_name = &caps[1];
                self.resolve(var_name)
                    .unwrap_or_else(|| format!("${{{}}}", var_name))
            })
            .to_string()
    }
}
