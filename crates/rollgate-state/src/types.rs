//! Domain types for the rollgate release store.

use rollgate_core::ArtifactKind;
use serde::{Deserialize, Serialize};

/// Highest meaningful rollout percentage.
pub const FULL_ROLLOUT: u8 = 100;

/// Durable record of a stable release and how far it has been rolled out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedRelease {
    pub version: String,
    pub kind: ArtifactKind,
    /// Share of devices (0-100) eligible for this release.
    pub rollout_percentage: u8,
    pub url: String,
    pub hash: String,
    /// Unix timestamp (seconds) of first observation.
    pub created_at: u64,
    /// Unix timestamp (seconds) of the last rollout change.
    pub updated_at: u64,
}

impl PersistedRelease {
    pub fn is_fully_rolled_out(&self) -> bool {
        self.rollout_percentage >= FULL_ROLLOUT
    }
}

/// Values used to create a release row on first sighting.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRelease {
    pub version: String,
    pub kind: ArtifactKind,
    pub rollout_percentage: u8,
    pub url: String,
    pub hash: String,
}

pub fn release_key(kind: ArtifactKind, version: &str) -> String {
    format!("{kind}:{version}")
}

pub fn kind_prefix(kind: ArtifactKind) -> String {
    format!("{kind}:")
}
