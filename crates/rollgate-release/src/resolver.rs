//! Artifact path resolver — SKU partition vs legacy layout.
//!
//! A version folder is either SKU-partitioned:
//!
//! ```text
//! {kind}/{version}/skus/{sku}/{artifact}
//! ```
//!
//! or legacy, predating SKU support:
//!
//! ```text
//! {kind}/{version}/{artifact}
//! ```
//!
//! A device must never receive a binary that was not validated for its SKU.
//! Partitioned versions serve only the exact SKU requested; legacy versions
//! serve only the default SKU, the hardware they were built for.

use std::sync::Arc;

use rollgate_core::ArtifactKind;
use rollgate_core::config::ReleaseConfig;
use rollgate_storage::ObjectStore;
use tracing::debug;

use crate::error::{ReleaseError, ReleaseResult};

/// Folder name marking a SKU-partitioned version.
pub const SKU_PARTITION: &str = "skus";

pub fn sku_partition_prefix(kind: ArtifactKind, version: &str) -> String {
    format!("{kind}/{version}/{SKU_PARTITION}/")
}

pub fn sku_artifact_key(kind: ArtifactKind, version: &str, sku: &str, artifact: &str) -> String {
    format!("{kind}/{version}/{SKU_PARTITION}/{sku}/{artifact}")
}

pub fn legacy_artifact_key(kind: ArtifactKind, version: &str, artifact: &str) -> String {
    format!("{kind}/{version}/{artifact}")
}

/// Check that a caller-supplied value is usable as one path segment.
pub fn validate_segment(what: &str, value: &str) -> ReleaseResult<()> {
    let bad = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains('/')
        || value.contains('\\');
    if bad {
        return Err(ReleaseError::InvalidInput(format!("invalid {what}: {value:?}")));
    }
    Ok(())
}

/// Decides which object key serves a `(kind, version, sku)` request.
#[derive(Clone)]
pub struct ArtifactResolver {
    store: Arc<dyn ObjectStore>,
    config: ReleaseConfig,
}

impl ArtifactResolver {
    pub fn new(store: Arc<dyn ObjectStore>, config: ReleaseConfig) -> Self {
        Self { store, config }
    }

    /// Artifact file name for a kind, honouring a caller override.
    pub fn artifact_name<'a>(&'a self, kind: ArtifactKind, artifact_override: Option<&'a str>) -> &'a str {
        artifact_override.unwrap_or_else(|| self.config.artifact_name(kind))
    }

    /// Resolve the object key of the artifact for `sku`.
    pub async fn resolve(
        &self,
        kind: ArtifactKind,
        version: &str,
        sku: &str,
        artifact_override: Option<&str>,
    ) -> ReleaseResult<String> {
        let artifact = self.artifact_name(kind, artifact_override);
        validate_segment("SKU", sku)?;
        validate_segment("artifact name", artifact)?;

        let partition = sku_partition_prefix(kind, version);
        let partitioned = self
            .store
            .prefix_exists(&partition)
            .await
            .map_err(|e| ReleaseError::storage(format!("probing {partition}"), e))?;

        let key = if partitioned {
            let key = sku_artifact_key(kind, version, sku, artifact);
            if !self.object_exists(&key).await? {
                return Err(ReleaseError::NotFound(format!(
                    "SKU {sku} not available for {kind} {version}"
                )));
            }
            key
        } else {
            if sku != self.config.default_sku {
                return Err(ReleaseError::NotFound(format!(
                    "{kind} {version} predates SKU support; only SKU {} is served",
                    self.config.default_sku
                )));
            }
            let key = legacy_artifact_key(kind, version, artifact);
            if !self.object_exists(&key).await? {
                return Err(ReleaseError::NotFound(format!(
                    "{kind} {version} has no {artifact} artifact"
                )));
            }
            key
        };

        debug!(%kind, version, sku, partitioned, %key, "artifact path resolved");
        Ok(key)
    }

    async fn object_exists(&self, key: &str) -> ReleaseResult<bool> {
        self.store
            .exists(key)
            .await
            .map_err(|e| ReleaseError::storage(format!("checking {key}"), e))
    }
}
