//! Release orchestrator — per-device release decisions.
//!
//! Combines the version lister, the persisted release store and the device
//! bucketer into the six-field answer a device receives:
//!
//! 1. Resolve the latest app and system releases concurrently.
//! 2. Pinned ranges and prerelease requests are answered directly from
//!    remote storage; the release store is not touched.
//! 3. Otherwise both versions are recorded (created at the initial rollout
//!    percentage on first sighting) and each kind independently serves
//!    either its latest release or its default, the highest release
//!    rolled out to 100%.

use std::sync::Arc;

use rollgate_core::config::ReleaseConfig;
use rollgate_core::{
    ArtifactChoice, ArtifactKind, ReleaseMetadata, ReleaseResponse, RollgateConfig, SemverRange,
    bucket, is_eligible,
};
use rollgate_state::{NewRelease, PersistedRelease, StateResult, StateStore};
use rollgate_storage::ObjectStore;
use semver::Version;
use tracing::{debug, info};

use crate::cache::{CacheKey, CacheStats, ReleaseCache};
use crate::error::{ReleaseError, ReleaseResult};
use crate::integrity::verify_stream;
use crate::lister::VersionLister;
use crate::resolver::{ArtifactResolver, validate_segment};

/// A device's update check.
#[derive(Debug, Clone, Default)]
pub struct ReleaseQuery {
    pub device_id: String,
    pub app_range: Option<String>,
    pub system_range: Option<String>,
    pub sku: Option<String>,
    pub prerelease: bool,
    pub force_update: bool,
}

/// A request for the download location of the latest artifact of a kind.
#[derive(Debug, Clone)]
pub struct RedirectQuery {
    pub kind: ArtifactKind,
    pub prerelease: bool,
    pub range: Option<String>,
    pub sku: Option<String>,
    pub artifact: Option<String>,
}

impl RedirectQuery {
    pub fn new(kind: ArtifactKind) -> Self {
        Self {
            kind,
            prerelease: false,
            range: None,
            sku: None,
            artifact: None,
        }
    }
}

/// Process-wide release engine, shared by every request handler.
pub struct Releases {
    state: StateStore,
    store: Arc<dyn ObjectStore>,
    lister: VersionLister,
    cache: Arc<ReleaseCache>,
    config: ReleaseConfig,
}

impl Releases {
    pub fn new(state: StateStore, store: Arc<dyn ObjectStore>, config: &RollgateConfig) -> Self {
        let cache = Arc::new(ReleaseCache::new(&config.cache));
        let resolver = ArtifactResolver::new(store.clone(), config.release.clone());
        let lister = VersionLister::new(
            store.clone(),
            resolver,
            cache.clone(),
            &config.storage.public_base_url,
        );
        Self {
            state,
            store,
            lister,
            cache,
            config: config.release.clone(),
        }
    }

    /// Decide which app and system release a device should run.
    pub async fn resolve(&self, query: ReleaseQuery) -> ReleaseResult<ReleaseResponse> {
        let device_id = query.device_id.as_str();
        if device_id.trim().is_empty() {
            return Err(ReleaseError::InvalidInput("deviceId is required".to_string()));
        }
        let app_range = SemverRange::effective(query.app_range.as_deref());
        let system_range = SemverRange::effective(query.system_range.as_deref());
        let sku = self.effective_sku(query.sku.as_deref())?;
        let skip_rollout = !app_range.is_wildcard() || !system_range.is_wildcard();

        let (app, system) = tokio::try_join!(
            self.lister
                .latest(ArtifactKind::App, query.prerelease, &app_range, &sku, None),
            self.lister
                .latest(ArtifactKind::System, query.prerelease, &system_range, &sku, None),
        )?;

        if query.prerelease || skip_rollout {
            debug!(
                prerelease = query.prerelease,
                skip_rollout,
                app = %app.version,
                system = %system.version,
                "serving latest without staged rollout"
            );
            return Ok(ReleaseResponse::new((&app).into(), (&system).into()));
        }

        let (app_row, system_row) = tokio::try_join!(
            self.record(ArtifactKind::App, &app),
            self.record(ArtifactKind::System, &system),
        )?;

        if query.force_update {
            info!(device_id, app = %app.version, system = %system.version, "forced update");
            return Ok(ReleaseResponse::new((&app).into(), (&system).into()));
        }

        let (app_default, system_default) = tokio::try_join!(
            self.default_release(ArtifactKind::App),
            self.default_release(ArtifactKind::System),
        )?;

        let device_bucket = bucket(device_id);
        let app_choice = choose(device_bucket, &app, &app_row, &app_default);
        let system_choice = choose(device_bucket, &system, &system_row, &system_default);
        info!(
            device_id,
            device_bucket,
            sku = %sku,
            app = %app_choice.version,
            app_rollout = app_row.rollout_percentage,
            system = %system_choice.version,
            system_rollout = system_row.rollout_percentage,
            "release resolved"
        );
        Ok(ReleaseResponse::new(app_choice, system_choice))
    }

    /// Verified public URL of the latest artifact matching `query`.
    ///
    /// The artifact is streamed and hashed against a freshly read digest
    /// before its URL is handed out; a mismatch is an integrity failure.
    pub async fn redirect_target(&self, query: RedirectQuery) -> ReleaseResult<String> {
        let range = SemverRange::effective(query.range.as_deref());
        let sku = self.effective_sku(query.sku.as_deref())?;
        let artifact_override = query.artifact.as_deref().filter(|a| !a.trim().is_empty());
        let artifact = self
            .lister
            .resolver()
            .artifact_name(query.kind, artifact_override)
            .to_string();
        let key = CacheKey::new(query.kind, query.prerelease, range.as_str(), &sku, &artifact);
        if let Some(url) = self.cache.get_redirect(&key) {
            return Ok(url);
        }

        let meta = self
            .lister
            .latest(query.kind, query.prerelease, &range, &sku, artifact_override)
            .await?;
        let stream = self
            .store
            .get_stream(&meta.artifact_key)
            .await
            .map_err(|e| ReleaseError::storage(format!("opening {}", meta.artifact_key), e))?;
        let expected = self.lister.fetch_digest(&meta.artifact_key).await?;
        let reason = format!(
            "{} {} ({sku}) does not match its published digest",
            query.kind, meta.version
        );
        verify_stream(stream, &expected, Some(&reason)).await?;

        info!(kind = %query.kind, version = %meta.version, sku = %sku, "redirect target verified");
        self.cache.insert_redirect(key, meta.url.clone());
        Ok(meta.url)
    }

    /// Operator action: move a release to `percentage` percent of devices.
    pub async fn set_rollout(
        &self,
        kind: ArtifactKind,
        version: &str,
        percentage: u8,
    ) -> ReleaseResult<PersistedRelease> {
        let version = version.to_string();
        let release = self
            .with_state("updating rollout percentage", move |state| {
                state.set_rollout_percentage(kind, &version, percentage)
            })
            .await?;
        info!(%kind, version = %release.version, percentage, "rollout percentage updated");
        Ok(release)
    }

    /// Persisted releases, optionally restricted to one kind.
    pub async fn list_releases(&self, kind: Option<ArtifactKind>) -> ReleaseResult<Vec<PersistedRelease>> {
        self.with_state("listing releases", move |state| state.list_releases(kind))
            .await
    }

    /// Drop cached metadata and redirect targets.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// `(metadata, redirects)` cache statistics.
    pub fn cache_stats(&self) -> (CacheStats, CacheStats) {
        self.cache.stats()
    }

    fn effective_sku(&self, sku: Option<&str>) -> ReleaseResult<String> {
        let sku = match sku.map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => self.config.default_sku.as_str(),
        };
        validate_segment("SKU", sku)?;
        Ok(sku.to_string())
    }

    /// Record a stable version on first sighting; existing rows are returned as-is.
    async fn record(&self, kind: ArtifactKind, meta: &ReleaseMetadata) -> ReleaseResult<PersistedRelease> {
        let new = NewRelease {
            version: meta.version.clone(),
            kind,
            rollout_percentage: self.config.initial_rollout_percentage,
            url: meta.url.clone(),
            hash: meta.hash.clone(),
        };
        self.with_state("recording release", move |state| state.upsert_release(&new))
            .await
    }

    /// Highest release of `kind` rolled out to every device.
    async fn default_release(&self, kind: ArtifactKind) -> ReleaseResult<PersistedRelease> {
        let rows = self
            .with_state("loading default release", move |state| {
                state.find_fully_rolled_out(kind)
            })
            .await?;
        rows.into_iter()
            .filter_map(|row| Version::parse(&row.version).ok().map(|v| (v, row)))
            .max_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, row)| row)
            .ok_or(ReleaseError::NoDefaultRelease(kind))
    }

    /// Run a release store call on the blocking pool.
    async fn with_state<T, F>(&self, context: &str, f: F) -> ReleaseResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&StateStore) -> StateResult<T> + Send + 'static,
    {
        let state = self.state.clone();
        tokio::task::spawn_blocking(move || f(&state))
            .await
            .map_err(|e| ReleaseError::upstream(context, e))?
            .map_err(|e| ReleaseError::state(context, e))
    }
}

/// Latest release when the device's bucket is inside its rollout, otherwise the default.
fn choose(
    device_bucket: u8,
    latest: &ReleaseMetadata,
    latest_row: &PersistedRelease,
    default: &PersistedRelease,
) -> ArtifactChoice {
    if is_eligible(device_bucket, latest_row.rollout_percentage) {
        ArtifactChoice::from(latest)
    } else {
        ArtifactChoice {
            version: default.version.clone(),
            url: default.url.clone(),
            hash: default.hash.clone(),
        }
    }
}
