//! rollgate.toml configuration parser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::ArtifactKind;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RollgateConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub release: ReleaseConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Directory holding `releases.redb`.
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            data_dir: PathBuf::from("/var/lib/rollgate"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Filesystem,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory for the filesystem backend.
    pub root: PathBuf,
    /// Prefix prepended to object keys to form artifact URLs.
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Filesystem,
            root: PathBuf::from("/srv/releases"),
            public_base_url: "http://localhost:8080/artifacts".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    /// SKU served from legacy (non-partitioned) version folders.
    pub default_sku: String,
    /// Rollout percentage assigned to a newly observed stable version.
    pub initial_rollout_percentage: u8,
    pub app_artifact: String,
    pub system_artifact: String,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            default_sku: "default".to_string(),
            initial_rollout_percentage: 10,
            app_artifact: "app.bin".to_string(),
            system_artifact: "system.bin".to_string(),
        }
    }
}

impl ReleaseConfig {
    /// Default artifact file name for a kind.
    pub fn artifact_name(&self, kind: ArtifactKind) -> &str {
        match kind {
            ArtifactKind::App => &self.app_artifact,
            ArtifactKind::System => &self.system_artifact,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            max_entries: 512,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl RollgateConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RollgateConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject settings the release engine cannot honour.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.release.initial_rollout_percentage > 100 {
            anyhow::bail!(
                "release.initial_rollout_percentage must be at most 100, got {}",
                self.release.initial_rollout_percentage
            );
        }
        if self.release.default_sku.trim().is_empty() {
            anyhow::bail!("release.default_sku must not be empty");
        }
        if self.cache.max_entries == 0 {
            anyhow::bail!("cache.max_entries must be positive");
        }
        Ok(())
    }
}
