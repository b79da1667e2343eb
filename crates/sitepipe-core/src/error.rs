//! Error types for sitepipe.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error in {input}: {message}")]
    Configuration { input: String, message: String },

    #[error("dependency resolution failed: {0}")]
    DependencyResolution(String),

    #[error("provisioning failed: {0}")]
    Provisioning(String),

    #[error("action '{action}' in stage '{stage}' failed: {message}")]
    PipelineExecution {
        stage: String,
        action: String,
        message: String,
    },

    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a configuration error naming the offending input.
    pub fn configuration(input: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Configuration {
            input: input.into(),
            message: message.into(),
        }
    }

    /// Whether the error was raised before anything reached the engine.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            Error::Configuration { .. }
                | Error::DependencyResolution(_)
                | Error::InvalidTopology(_)
                | Error::InvalidPlan(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
