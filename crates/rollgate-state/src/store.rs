//! StateStore — redb-backed persistence for release rollout state.
//!
//! Provides typed operations over persisted releases. All values are
//! JSON-serialized into redb's `&[u8]` value columns. The store supports
//! both on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use rollgate_core::{ArtifactKind, unix_now};
use tracing::{debug, info};

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe release store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent release store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "release store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory release store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory release store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(RELEASES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Create the `(version, kind)` row if absent, otherwise return the
    /// existing row untouched.
    ///
    /// The lookup and the insert share one write transaction, so two
    /// concurrent first sightings of a version cannot both create it.
    pub fn upsert_release(&self, new: &NewRelease) -> StateResult<PersistedRelease> {
        if new.rollout_percentage > FULL_ROLLOUT {
            return Err(StateError::Invalid(format!(
                "rollout percentage {} exceeds 100",
                new.rollout_percentage
            )));
        }
        let key = release_key(new.kind, &new.version);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let release;
        let created;
        {
            let mut table = txn.open_table(RELEASES).map_err(map_err!(Table))?;
            let existing = match table.get(key.as_str()).map_err(map_err!(Read))? {
                Some(guard) => Some(
                    serde_json::from_slice::<PersistedRelease>(guard.value())
                        .map_err(map_err!(Deserialize))?,
                ),
                None => None,
            };
            match existing {
                Some(found) => {
                    release = found;
                    created = false;
                }
                None => {
                    let now = unix_now();
                    let fresh = PersistedRelease {
                        version: new.version.clone(),
                        kind: new.kind,
                        rollout_percentage: new.rollout_percentage,
                        url: new.url.clone(),
                        hash: new.hash.clone(),
                        created_at: now,
                        updated_at: now,
                    };
                    let value = serde_json::to_vec(&fresh).map_err(map_err!(Serialize))?;
                    table
                        .insert(key.as_str(), value.as_slice())
                        .map_err(map_err!(Write))?;
                    release = fresh;
                    created = true;
                }
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        if created {
            info!(
                %key,
                rollout = release.rollout_percentage,
                "new release recorded"
            );
        }
        Ok(release)
    }

    /// Get a release by kind and version.
    pub fn get_release(
        &self,
        kind: ArtifactKind,
        version: &str,
    ) -> StateResult<Option<PersistedRelease>> {
        let key = release_key(kind, version);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(RELEASES).map_err(map_err!(Table))?;
        match table.get(key.as_str()).map_err(map_err!(Read))? {
            Some(guard) => {
                let release: PersistedRelease =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(release))
            }
            None => Ok(None),
        }
    }

    /// List releases, optionally restricted to one kind.
    pub fn list_releases(&self, kind: Option<ArtifactKind>) -> StateResult<Vec<PersistedRelease>> {
        let prefix = kind.map(kind_prefix);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(RELEASES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if let Some(prefix) = &prefix
                && !key.value().starts_with(prefix.as_str())
            {
                continue;
            }
            let release: PersistedRelease =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(release);
        }
        Ok(results)
    }

    /// All releases of `kind` rolled out to every device.
    pub fn find_fully_rolled_out(&self, kind: ArtifactKind) -> StateResult<Vec<PersistedRelease>> {
        Ok(self
            .list_releases(Some(kind))?
            .into_iter()
            .filter(PersistedRelease::is_fully_rolled_out)
            .collect())
    }

    /// Operator action: change how far a release is rolled out.
    pub fn set_rollout_percentage(
        &self,
        kind: ArtifactKind,
        version: &str,
        percentage: u8,
    ) -> StateResult<PersistedRelease> {
        if percentage > FULL_ROLLOUT {
            return Err(StateError::Invalid(format!(
                "rollout percentage {percentage} exceeds 100"
            )));
        }
        let key = release_key(kind, version);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let release;
        {
            let mut table = txn.open_table(RELEASES).map_err(map_err!(Table))?;
            let mut current = match table.get(key.as_str()).map_err(map_err!(Read))? {
                Some(guard) => serde_json::from_slice::<PersistedRelease>(guard.value())
                    .map_err(map_err!(Deserialize))?,
                None => return Err(StateError::NotFound(key)),
            };
            current.rollout_percentage = percentage;
            current.updated_at = unix_now();
            let value = serde_json::to_vec(&current).map_err(map_err!(Serialize))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            release = current;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        info!(%key, rollout = percentage, "rollout percentage updated");
        Ok(release)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_release(kind: ArtifactKind, version: &str, pct: u8) -> NewRelease {
        NewRelease {
            version: version.to_string(),
            kind,
            rollout_percentage: pct,
            url: format!("https://cdn.example.com/{kind}/{version}/{kind}.bin"),
            hash: format!("hash-{version}"),
        }
    }

    // ── Upsert ─────────────────────────────────────────────────────

    #[test]
    fn upsert_creates_missing_release() {
        let store = StateStore::open_in_memory().unwrap();
        let release = store
            .upsert_release(&new_release(ArtifactKind::App, "1.2.0", 10))
            .unwrap();

        assert_eq!(release.rollout_percentage, 10);
        assert_eq!(release.hash, "hash-1.2.0");
        let fetched = store.get_release(ArtifactKind::App, "1.2.0").unwrap();
        assert_eq!(fetched, Some(release));
    }

    #[test]
    fn upsert_never_overwrites_existing_percentage() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .upsert_release(&new_release(ArtifactKind::App, "1.2.0", 10))
            .unwrap();
        store
            .set_rollout_percentage(ArtifactKind::App, "1.2.0", 60)
            .unwrap();

        let again = store
            .upsert_release(&new_release(ArtifactKind::App, "1.2.0", 10))
            .unwrap();
        assert_eq!(again.rollout_percentage, 60);
        assert_eq!(store.list_releases(None).unwrap().len(), 1);
    }

    #[test]
    fn same_version_different_kinds_are_distinct_rows() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .upsert_release(&new_release(ArtifactKind::App, "1.0.0", 10))
            .unwrap();
        store
            .upsert_release(&new_release(ArtifactKind::System, "1.0.0", 100))
            .unwrap();

        assert_eq!(store.list_releases(Some(ArtifactKind::App)).unwrap().len(), 1);
        assert_eq!(store.list_releases(Some(ArtifactKind::System)).unwrap().len(), 1);
        assert_eq!(store.list_releases(None).unwrap().len(), 2);
    }

    #[test]
    fn concurrent_first_sightings_create_one_row() {
        let store = StateStore::open_in_memory().unwrap();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    // Racing writers disagree on the initial percentage.
                    store
                        .upsert_release(&new_release(ArtifactKind::System, "4.0.0", 10 + i))
                        .unwrap()
                })
            })
            .collect();
        let results: Vec<PersistedRelease> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        let first = results[0].rollout_percentage;
        assert!(results.iter().all(|r| r.rollout_percentage == first));
        assert_eq!(store.list_releases(None).unwrap().len(), 1);
    }

    #[test]
    fn upsert_rejects_percentage_over_100() {
        let store = StateStore::open_in_memory().unwrap();
        let err = store
            .upsert_release(&new_release(ArtifactKind::App, "1.0.0", 101))
            .unwrap_err();
        assert!(matches!(err, StateError::Invalid(_)));
    }

    // ── Queries ────────────────────────────────────────────────────

    #[test]
    fn find_fully_rolled_out_filters_by_kind_and_percentage() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .upsert_release(&new_release(ArtifactKind::App, "1.1.0", 100))
            .unwrap();
        store
            .upsert_release(&new_release(ArtifactKind::App, "1.2.0", 10))
            .unwrap();
        store
            .upsert_release(&new_release(ArtifactKind::System, "3.0.0", 100))
            .unwrap();

        let full = store.find_fully_rolled_out(ArtifactKind::App).unwrap();
        assert_eq!(full.len(), 1);
        assert_eq!(full[0].version, "1.1.0");
    }

    #[test]
    fn get_nonexistent_returns_none() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.get_release(ArtifactKind::App, "9.9.9").unwrap().is_none());
        assert!(store.list_releases(None).unwrap().is_empty());
    }

    // ── Operator updates ───────────────────────────────────────────

    #[test]
    fn set_rollout_percentage_updates_row() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .upsert_release(&new_release(ArtifactKind::App, "1.2.0", 10))
            .unwrap();

        let updated = store
            .set_rollout_percentage(ArtifactKind::App, "1.2.0", 100)
            .unwrap();
        assert!(updated.is_fully_rolled_out());
        assert_eq!(store.find_fully_rolled_out(ArtifactKind::App).unwrap().len(), 1);
    }

    #[test]
    fn set_rollout_percentage_on_missing_release() {
        let store = StateStore::open_in_memory().unwrap();
        let err = store
            .set_rollout_percentage(ArtifactKind::App, "1.0.0", 50)
            .unwrap_err();
        assert!(matches!(err, StateError::NotFound(_)));
    }

    #[test]
    fn set_rollout_percentage_rejects_over_100() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .upsert_release(&new_release(ArtifactKind::App, "1.0.0", 10))
            .unwrap();
        let err = store
            .set_rollout_percentage(ArtifactKind::App, "1.0.0", 200)
            .unwrap_err();
        assert!(matches!(err, StateError::Invalid(_)));
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("releases.redb");

        {
            let store = StateStore::open(&db_path).unwrap();
            store
                .upsert_release(&new_release(ArtifactKind::System, "2.0.0", 10))
                .unwrap();
            store
                .set_rollout_percentage(ArtifactKind::System, "2.0.0", 40)
                .unwrap();
        }

        // Reopen the same database file.
        let store = StateStore::open(&db_path).unwrap();
        let release = store.get_release(ArtifactKind::System, "2.0.0").unwrap();
        assert_eq!(release.unwrap().rollout_percentage, 40);
    }
}
