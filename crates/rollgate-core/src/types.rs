//! Shared types used across rollgate crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The two independently rolled-out artifact families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    App,
    System,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::App => "app",
            ArtifactKind::System => "system",
        }
    }

    /// Remote namespace holding one folder per published version.
    pub fn namespace(&self) -> String {
        format!("{}/", self.as_str())
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown artifact kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for ArtifactKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "app" => Ok(ArtifactKind::App),
            "system" => Ok(ArtifactKind::System),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// Latest-release facts derived from remote storage.
///
/// Built by the version lister and shared through the cache; never mutated
/// after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseMetadata {
    pub version: String,
    pub url: String,
    /// Hex SHA-256 of the artifact, as published in its `.sha256` file.
    pub hash: String,
    /// Object key the artifact was resolved to (`url` without the public base).
    pub artifact_key: String,
    /// Unix timestamp (seconds) when the metadata was resolved.
    pub cached_at: u64,
    /// Effective range the version was selected against.
    pub satisfying_range: String,
}

/// One artifact's slice of a device response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactChoice {
    pub version: String,
    pub url: String,
    pub hash: String,
}

impl From<&ReleaseMetadata> for ArtifactChoice {
    fn from(meta: &ReleaseMetadata) -> Self {
        Self {
            version: meta.version.clone(),
            url: meta.url.clone(),
            hash: meta.hash.clone(),
        }
    }
}

/// The six-field record returned to a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseResponse {
    pub app_version: String,
    pub app_url: String,
    pub app_hash: String,
    pub system_version: String,
    pub system_url: String,
    pub system_hash: String,
}

impl ReleaseResponse {
    pub fn new(app: ArtifactChoice, system: ArtifactChoice) -> Self {
        Self {
            app_version: app.version,
            app_url: app.url,
            app_hash: app.hash,
            system_version: system.version,
            system_url: system.url,
            system_hash: system.hash,
        }
    }
}

/// Current unix time in seconds (0 if the clock is before the epoch).
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
