//! Version lister — latest published version of a kind, as metadata.
//!
//! Lists the version folders under `{kind}/`, keeps those named by a valid
//! semver version, applies the semver gate, resolves the artifact path for
//! the requested SKU and reads the co-located digest. Results are memoized
//! in the [`ReleaseCache`] under every dimension of the lookup.

use std::sync::Arc;

use rollgate_core::digest::{digest_key, normalize_digest_text};
use rollgate_core::version::parse_versions;
use rollgate_core::{ArtifactKind, ReleaseMetadata, SemverRange, max_satisfying, unix_now};
use rollgate_storage::ObjectStore;
use tracing::{debug, info};

use crate::cache::{CacheKey, ReleaseCache};
use crate::error::{ReleaseError, ReleaseResult};
use crate::resolver::ArtifactResolver;

#[derive(Clone)]
pub struct VersionLister {
    store: Arc<dyn ObjectStore>,
    resolver: ArtifactResolver,
    cache: Arc<ReleaseCache>,
    public_base_url: String,
}

impl VersionLister {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        resolver: ArtifactResolver,
        cache: Arc<ReleaseCache>,
        public_base_url: &str,
    ) -> Self {
        Self {
            store,
            resolver,
            cache,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn resolver(&self) -> &ArtifactResolver {
        &self.resolver
    }

    /// Public URL of an object key.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    /// Latest version of `kind` satisfying `range` that is published for `sku`.
    pub async fn latest(
        &self,
        kind: ArtifactKind,
        include_prerelease: bool,
        range: &SemverRange,
        sku: &str,
        artifact_override: Option<&str>,
    ) -> ReleaseResult<ReleaseMetadata> {
        let artifact = self.resolver.artifact_name(kind, artifact_override);
        let key = CacheKey::new(kind, include_prerelease, range.as_str(), sku, artifact);
        if let Some(hit) = self.cache.get_metadata(&key) {
            return Ok(hit);
        }

        let metadata = self
            .lookup(kind, include_prerelease, range, sku, artifact_override)
            .await?;
        self.cache.insert_metadata(key, metadata.clone());
        Ok(metadata)
    }

    async fn lookup(
        &self,
        kind: ArtifactKind,
        include_prerelease: bool,
        range: &SemverRange,
        sku: &str,
        artifact_override: Option<&str>,
    ) -> ReleaseResult<ReleaseMetadata> {
        let namespace = kind.namespace();
        let folders = self
            .store
            .list_common_prefixes(&namespace)
            .await
            .map_err(|e| ReleaseError::storage(format!("listing {kind} versions"), e))?;

        let valid = parse_versions(folders.iter().map(String::as_str)).len();
        if valid == 0 {
            return Err(ReleaseError::NotFound(format!("no valid {kind} versions")));
        }
        debug!(%kind, listed = folders.len(), valid, "version folders listed");

        let version = max_satisfying(folders.iter().map(String::as_str), range, include_prerelease)
            .ok_or_else(|| {
                ReleaseError::NotFound(format!("no {kind} version satisfies `{range}`"))
            })?
            .to_string();

        let artifact_key = self
            .resolver
            .resolve(kind, &version, sku, artifact_override)
            .await?;
        let hash = self.fetch_digest(&artifact_key).await?;

        info!(%kind, %version, sku, range = %range, include_prerelease, "latest release resolved");
        Ok(ReleaseMetadata {
            url: self.public_url(&artifact_key),
            version,
            hash,
            artifact_key,
            cached_at: unix_now(),
            satisfying_range: range.to_string(),
        })
    }

    /// Read and normalize the digest published next to an artifact.
    pub async fn fetch_digest(&self, artifact_key: &str) -> ReleaseResult<String> {
        let key = digest_key(artifact_key);
        let bytes = self
            .store
            .get(&key)
            .await
            .map_err(|e| ReleaseError::storage(format!("fetching {key}"), e))?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|e| ReleaseError::upstream(format!("decoding {key} as UTF-8"), e))?;
        Ok(normalize_digest_text(text))
    }
}
