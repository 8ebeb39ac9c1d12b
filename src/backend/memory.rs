use super::CacheBackend;
use crate::core::error::{QueryCacheError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Stored value with its expiry.
#[derive(Debug, Clone)]
struct StoredValue {
    data: Vec<u8>,
    expires_at: Instant,
}

impl StoredValue {
    fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Statistics for the in-process backend.
#[derive(Debug, Default, Clone)]
pub struct MemoryStats {
    pub gets: u64,
    pub sets: u64,
    pub dels: u64,
    pub hits: u64,
    pub misses: u64,
}

/// In-process TTL map backend.
///
/// Expired entries are dropped lazily on access; [`purge_expired`] exists for
/// callers that want to reclaim memory eagerly. Cloning shares the underlying
/// storage.
///
/// [`purge_expired`]: MemoryBackend::purge_expired
#[derive(Clone)]
pub struct MemoryBackend {
    data: Arc<RwLock<HashMap<String, StoredValue>>>,
    stats: Arc<RwLock<MemoryStats>>,
    max_entries: usize,
}

impl MemoryBackend {
    /// Create a backend holding at most `max_entries` live entries. Inserting
    /// a new key beyond the limit fails the write; there is no eviction.
    pub fn new(max_entries: usize) -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(MemoryStats::default())),
            max_entries,
        }
    }

    /// Number of entries currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        let mut data = self.data.write();
        let before = data.len();
        data.retain(|_, value| !value.is_expired());
        let purged = before - data.len();
        if purged > 0 {
            debug!(purged, "purged expired entries");
        }
    }

    /// Snapshot of the backend counters.
    pub fn stats(&self) -> MemoryStats {
        self.stats.read().clone()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut data = self.data.write();
        let mut stats = self.stats.write();
        stats.gets += 1;

        let expired = match data.get(key) {
            Some(value) => value.is_expired(),
            None => {
                stats.misses += 1;
                return Ok(None);
            }
        };
        if expired {
            debug!(key, "entry expired");
            data.remove(key);
            stats.misses += 1;
            return Ok(None);
        }

        stats.hits += 1;
        Ok(data.get(key).map(|value| value.data.clone()))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            debug!(key, "zero ttl, not persisting");
            return Ok(());
        }

        let mut data = self.data.write();
        if data.len() >= self.max_entries && !data.contains_key(key) {
            return Err(QueryCacheError::Backend(format!(
                "memory backend is full ({} entries)",
                self.max_entries
            )));
        }

        debug!(key, size = value.len(), ?ttl, "storing entry");
        data.insert(key.to_string(), StoredValue::new(value.to_vec(), ttl));
        self.stats.write().sets += 1;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut data = self.data.write();
        if data.remove(key).is_some() {
            debug!(key, "deleted entry");
            self.stats.write().dels += 1;
        }
        Ok(())
    }
}
