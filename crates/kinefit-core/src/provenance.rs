//! Provenance and schema descriptors attached to run artefacts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version of the manifest and result document layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Bumped when a field is removed or changes meaning.
    pub major: u32,
    /// Bumped when a field is added.
    pub minor: u32,
    /// Bumped for fixes that leave the layout intact.
    pub patch: u32,
}

impl SchemaVersion {
    /// Layout written by this version of kinefit.
    pub const CURRENT: Self = Self {
        major: 1,
        minor: 0,
        patch: 0,
    };

    /// Returns true when a document written under `self` can be read by
    /// this version.
    pub fn is_readable(&self) -> bool {
        self.major == Self::CURRENT.major && self.minor <= Self::CURRENT.minor
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

/// Provenance information recorded next to every fit result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RunProvenance {
    /// Schema of the artefact carrying this provenance.
    #[serde(default)]
    pub schema: SchemaVersion,
    /// SHA-256 of the serialized fit configuration.
    pub config_hash: String,
    /// SHA-256 of the observed cube, when one was supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cube_hash: Option<String>,
    /// Master deterministic seed used for all randomness.
    pub seed: u64,
    /// RFC 3339 timestamp recording when the artefact was generated.
    pub created_at: String,
    /// Version map for all tools involved in the run.
    pub tool_versions: BTreeMap<String, String>,
}
