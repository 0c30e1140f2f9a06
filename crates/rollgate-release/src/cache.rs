//! Release cache with TTL expiration and LRU eviction.
//!
//! Listing remote storage on every device poll is expensive, so resolved
//! release metadata and verified redirect targets are memoized for a fixed
//! TTL (five minutes by default). A few minutes of staleness in "latest" is
//! accepted in exchange.
//!
//! Concurrent misses on the same key are not de-duplicated: both callers
//! recompute the same value from the same source and the last write wins.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use rollgate_core::config::CacheConfig;
use rollgate_core::{ArtifactKind, ReleaseMetadata};

/// Composite cache key over every dimension that changes a lookup result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: ArtifactKind,
    pub prerelease: bool,
    pub range: String,
    pub sku: String,
    pub artifact: String,
}

impl CacheKey {
    pub fn new(kind: ArtifactKind, prerelease: bool, range: &str, sku: &str, artifact: &str) -> Self {
        Self {
            kind,
            prerelease,
            range: range.to_string(),
            sku: sku.to_string(),
            artifact: artifact.to_string(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            self.kind, self.prerelease, self.range, self.sku, self.artifact
        )
    }
}

/// A single cached value with TTL and LRU tracking.
struct CacheEntry<V> {
    value: V,
    /// When this entry was inserted (for TTL calculation).
    inserted_at: Instant,
    /// Last read or write, for LRU eviction.
    last_accessed: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V) -> Self {
        let now = Instant::now();
        Self {
            value,
            inserted_at: now,
            last_accessed: now,
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() > ttl
    }
}

/// Accumulated cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

/// Bounded TTL map.
///
/// Not internally synchronized; [`ReleaseCache`] wraps it in a `Mutex`.
pub struct TtlCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    ttl: Duration,
    max_entries: usize,
    stats: CacheStats,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Display,
    V: Clone,
{
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
            stats: CacheStats::default(),
        }
    }

    /// Look up a key, returning a clone of the value if present and fresh.
    ///
    /// Expired entries are removed eagerly and count as misses.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let ttl = self.ttl;
        match self.entries.get_mut(key) {
            Some(entry) if !entry.is_expired(ttl) => {
                entry.last_accessed = Instant::now();
                self.stats.hits += 1;
                tracing::debug!(%key, cache_hits = self.stats.hits, "release cache hit");
                Some(entry.value.clone())
            }
            Some(_) => {
                self.entries.remove(key);
                self.stats.misses += 1;
                tracing::debug!(%key, cache_misses = self.stats.misses, "release cache miss (expired)");
                None
            }
            None => {
                self.stats.misses += 1;
                tracing::debug!(%key, cache_misses = self.stats.misses, "release cache miss");
                None
            }
        }
    }

    /// Insert or replace an entry, evicting the least-recently-used entry
    /// when at capacity.
    pub fn insert(&mut self, key: K, value: V) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.evict_lru();
        }
        self.entries.insert(key, CacheEntry::new(value));
    }

    fn evict_lru(&mut self) {
        let lru_key = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(key, _)| key.clone());

        if let Some(key) = lru_key {
            self.entries.remove(&key);
            self.stats.evictions += 1;
            tracing::debug!(
                evicted = %key,
                cache_evictions = self.stats.evictions,
                "release cache LRU eviction"
            );
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            ..self.stats
        }
    }}

/// Process-wide caches for release metadata and redirect targets.
///
/// Lock hold time is a single map lookup or insert; remote lookups run
/// outside the lock.
pub struct ReleaseCache {
    metadata: Mutex<TtlCache<CacheKey, ReleaseMetadata>>,
    redirects: Mutex<TtlCache<CacheKey, String>>,
}

impl ReleaseCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            metadata: Mutex::new(TtlCache::new(config.ttl(), config.max_entries)),
            redirects: Mutex::new(TtlCache::new(config.ttl(), config.max_entries)),
        }
    }

    pub fn get_metadata(&self, key: &CacheKey) -> Option<ReleaseMetadata> {
        self.metadata
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
    }

    pub fn insert_metadata(&self, key: CacheKey, value: ReleaseMetadata) {
        self.metadata
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }

    pub fn get_redirect(&self, key: &CacheKey) -> Option<String> {
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
    }

    pub fn insert_redirect(&self, key: CacheKey, url: String) {
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, url);
    }

    /// Drop every cached entry; the next lookups hit remote storage.
    pub fn clear(&self) {
        self.metadata
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        tracing::info!("release cache cleared");
    }

    /// `(metadata, redirects)` statistics.
    pub fn stats(&self) -> (CacheStats, CacheStats) {
        let metadata = self
            .metadata
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stats();
        let redirects = self
            .redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stats();
        (metadata, redirects)
    }
}
