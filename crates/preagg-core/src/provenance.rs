//! Provenance and schema descriptors shared across preagg artifacts.

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Semantic version describing the schema of serialized payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Major version incremented for breaking changes.
    pub major: u32,
    /// Minor version incremented for additive changes.
    pub minor: u32,
    /// Patch version incremented for bug fixes and documentation updates.
    pub patch: u32,
}

impl SchemaVersion {
    /// Creates a new schema version descriptor.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

/// Provenance information attached to generated packages and reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RunProvenance {
    /// Seed used for all randomness of the artifact, when any.
    #[serde(default)]
    pub seed: Option<u64>,
    /// ISO-8601 timestamp recording when the artifact was generated.
    pub created_at: String,
    /// Version map for all tools involved in the run.
    #[serde(default)]
    pub tool_versions: BTreeMap<String, String>,
}

impl RunProvenance {
    /// Captures provenance for an artifact produced now.
    pub fn now(seed: Option<u64>) -> Self {
        let mut tool_versions = BTreeMap::new();
        tool_versions.insert("preagg".to_string(), env!("CARGO_PKG_VERSION").to_string());
        Self {
            seed,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            tool_versions,
        }
    }
}
