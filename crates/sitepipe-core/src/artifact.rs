//! Artifacts passed between pipeline actions.

use derive_more::Display;
use serde::Serialize;

/// Raw checkout of the source repository.
pub const SOURCE: &str = "source";
/// Synthesized infrastructure definitions.
pub const SYNTH: &str = "synth";
/// Built website, ready to be copied into storage.
pub const WEBSITE: &str = "website";

/// A named artifact. Exactly one action produces it; any number consume it.
/// Contents are opaque to the plan.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Display)]
#[display("{_0}")]
#[serde(transparent)]
pub struct Artifact(String);

impl Artifact {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn source() -> Self {
        Self::new(SOURCE)
    }

    pub fn synth() -> Self {
        Self::new(SYNTH)
    }

    pub fn website() -> Self {
        Self::new(WEBSITE)
    }
}
