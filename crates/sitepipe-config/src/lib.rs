//! KDL configuration parsing for sitepipe.
//!
//! This crate handles:
//! - Site definitions (sitepipe.kdl)
//! - Process settings (environment, account, region)
//! - Variable interpolation

pub mod error;
pub mod settings;
pub mod site;
pub mod variables;

pub use error::{ConfigError, ConfigResult};
pub use settings::DeploySettings;
pub use site::{SiteConfig, load_site, parse_site};
pub use variables::VariableContext;
