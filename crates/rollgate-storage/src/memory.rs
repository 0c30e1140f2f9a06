//! In-memory object store.
//!
//! Backs tests and the `memory` storage backend. Objects can be added and
//! removed at runtime to simulate publishes against a live engine.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{StorageError, StorageResult};
use crate::traits::{ByteStream, ObjectStore, validate_key};

/// Chunk size used when streaming objects.
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Thread-safe in-memory bucket. Clones share the same objects.
#[derive(Clone, Default)]
pub struct MemoryStore {
    objects: Arc<RwLock<BTreeMap<String, Bytes>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object, replacing any previous content.
    pub fn put(&self, key: &str, data: impl Into<Bytes>) -> StorageResult<()> {
        validate_key(key)?;
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        objects.insert(key.to_string(), data.into());
        Ok(())
    }

    /// Remove an object. Returns true if it existed.
    pub fn remove(&self, key: &str) -> bool {
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        objects.remove(key).is_some()
    }

    /// Remove every object under `prefix`. Returns the number removed.
    pub fn remove_prefix(&self, prefix: &str) -> usize {
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        let before = objects.len();
        objects.retain(|key, _| !key.starts_with(prefix));
        before - objects.len()
    }

    pub fn len(&self) -> usize {
        self.objects.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &str) -> StorageResult<Bytes> {
        validate_key(key)?;
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_common_prefixes(&self, prefix: &str) -> StorageResult<BTreeSet<String>> {
        validate_key(prefix)?;
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        let folders = objects
            .keys()
            .filter_map(|key| key.strip_prefix(prefix))
            .filter_map(|rest| rest.split_once('/').map(|(folder, _)| folder))
            .filter(|folder| !folder.is_empty())
            .map(str::to_string)
            .collect();
        Ok(folders)
    }

    async fn prefix_exists(&self, prefix: &str) -> StorageResult<bool> {
        validate_key(prefix)?;
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        Ok(objects
            .range(prefix.to_string()..)
            .next()
            .is_some_and(|(key, _)| key.starts_with(prefix)))
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        Ok(objects.contains_key(key))
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.lookup(key)
    }

    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        let data = self.lookup(key)?;
        let chunks: Vec<StorageResult<Bytes>> = (0..data.len())
            .step_by(STREAM_CHUNK_SIZE)
            .map(|start| Ok(data.slice(start..(start + STREAM_CHUNK_SIZE).min(data.len()))))
            .collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}
