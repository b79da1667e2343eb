//! Credential references.

use serde::Serialize;

/// Where a secret lives, never what it is.
///
/// Plans only ever carry the reference; the engine resolves the value when
/// the action runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "store", rename_all = "snake_case")]
pub enum SecretRef {
    /// A named entry in the cloud secret manager.
    SecretsManager {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        json_field: Option<String>,
    },
}

impl SecretRef {
    pub fn secrets_manager(name: impl Into<String>) -> Self {
        SecretRef::SecretsManager {
            name: name.into(),
            json_field: None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SecretRef::SecretsManager { name, .. } => name,
        }
    }
}

impl std::fmt::Display for SecretRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretRef::SecretsManager {
                name,
                json_field: Some(field),
            } => write!(f, "secretsmanager:{name}#{field}"),
            SecretRef::SecretsManager { name, .. } => write!(f, "secretsmanager:{name}"),
        }
    }
}
