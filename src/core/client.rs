use super::error::{ComputeError, QueryCacheError, Result};
use super::types::{CacheKind, EntryMeta, IndexStats, QueryOptions};
use crate::backend::CacheBackend;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Prefix applied to every key before it reaches a backend, so cached query
/// results cannot collide with unrelated data in a shared store.
const KEY_FETCH_PREFIX: &str = "gqc_fetch_";

fn fetch_key(key: &str) -> String {
    format!("{KEY_FETCH_PREFIX}{key}")
}

/// Builder for [`QueryClient`]. Either backend slot may be left empty;
/// requesting an absent backend at query time is a configuration error.
#[derive(Default)]
pub struct QueryClientBuilder {
    memory: Option<Arc<dyn CacheBackend>>,
    remote: Option<Arc<dyn CacheBackend>>,
}

impl QueryClientBuilder {
    /// Backend serving [`CacheKind::Memory`].
    pub fn memory(mut self, backend: impl CacheBackend + 'static) -> Self {
        self.memory = Some(Arc::new(backend));
        self
    }

    /// Backend serving [`CacheKind::Remote`].
    pub fn remote(mut self, backend: impl CacheBackend + 'static) -> Self {
        self.remote = Some(Arc::new(backend));
        self
    }

    pub fn build(self) -> QueryClient {
        info!(
            memory = self.memory.is_some(),
            remote = self.remote.is_some(),
            "initializing query cache client"
        );
        QueryClient {
            memory: self.memory,
            remote: self.remote,
            index: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(IndexStats::default())),
        }
    }
}

/// Read-through / write-through caching coordinator.
///
/// Sits in front of an arbitrary computation and memoizes its result under
/// one or more logical keys in a pluggable backend. Callers hand over the
/// computation itself, so the client decides per call whether to serve a
/// cached artifact or invoke it.
///
/// The metadata index (key -> freshness and backend location) is owned by
/// this instance and guarded by a single reader/writer lock; the lock is
/// never held across backend I/O. Concurrent misses for the same key are not
/// de-duplicated: each invokes the computation and the last writer wins.
/// Cloning shares the index and the backends.
#[derive(Clone)]
pub struct QueryClient {
    memory: Option<Arc<dyn CacheBackend>>,
    remote: Option<Arc<dyn CacheBackend>>,
    index: Arc<RwLock<HashMap<String, EntryMeta>>>,
    stats: Arc<RwLock<IndexStats>>,
}

impl QueryClient {
    pub fn builder() -> QueryClientBuilder {
        QueryClientBuilder::default()
    }

    fn backend(&self, kind: CacheKind) -> Option<&Arc<dyn CacheBackend>> {
        match kind {
            CacheKind::Memory => self.memory.as_ref(),
            CacheKind::Remote => self.remote.as_ref(),
        }
    }

    /// Fail fast when the options name a backend this client was not built
    /// with. Never degrades silently to "no cache".
    fn check_backend_configured(&self, options: &QueryOptions) -> Result<()> {
        match options.cache_kind {
            Some(kind) if self.backend(kind).is_none() => {
                Err(QueryCacheError::BackendNotConfigured(kind))
            }
            _ => Ok(()),
        }
    }

    /// Snapshot of the orchestrator counters.
    pub fn stats(&self) -> IndexStats {
        self.stats.read().clone()
    }

    /// Serve the result of `query_fn` from cache, or invoke it and cache the
    /// outcome under `options.keys`.
    ///
    /// The value always round-trips through JSON, on the hit path and the
    /// miss path alike: a freshly computed value is marshaled and then
    /// unmarshaled into `T` before being returned. Both paths can therefore
    /// fail with the same serialization errors, and a shape mismatch between
    /// the computation's output and `T` is caught on the very first call.
    ///
    /// Any anomaly while reading a cached value (backend miss, corrupt or
    /// tampered payload) is repaired by recomputing, never surfaced as an
    /// error. Backend write failures are surfaced. Dropping the returned
    /// future cancels the computation.
    pub async fn query<T, V, F, Fut>(&self, query_fn: F, options: Option<&QueryOptions>) -> Result<T>
    where
        T: DeserializeOwned,
        V: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, ComputeError>>,
    {
        let Some(options) = options else {
            return self.do_query(query_fn, None).await;
        };
        if options.keys.is_empty() {
            return self.do_query(query_fn, Some(options)).await;
        }
        self.check_backend_configured(options)?;

        // Staleness is decided from the first key only; all keys in one call
        // share one lifecycle.
        let first_key = &options.keys[0];
        let meta = self.index.read().get(first_key).copied();

        let Some(meta) = meta else {
            self.stats.write().misses += 1;
            debug!(key = %first_key, "index miss");
            return self.do_query(query_fn, Some(options)).await;
        };
        if meta.is_stale() {
            self.stats.write().stale_evictions += 1;
            debug!(key = %first_key, "entry stale, evicting");
            self.evict(options.cache_kind, &options.keys).await;
            return self.do_query(query_fn, Some(options)).await;
        }

        let backend = meta.sink.and_then(|kind| self.backend(kind));
        let Some(backend) = backend else {
            // Tracked without a sink: nothing persisted to serve from.
            return self.do_query(query_fn, Some(options)).await;
        };

        match backend.get(&fetch_key(first_key)).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => {
                    self.stats.write().hits += 1;
                    debug!(key = %first_key, "cache hit");
                    Ok(value)
                }
                Err(err) => {
                    self.stats.write().corrupt_fallbacks += 1;
                    warn!(key = %first_key, %err, "corrupt cache payload, recomputing");
                    self.do_query(query_fn, Some(options)).await
                }
            },
            Ok(None) => {
                self.stats.write().corrupt_fallbacks += 1;
                debug!(key = %first_key, "backend miss for fresh entry, recomputing");
                self.do_query(query_fn, Some(options)).await
            }
            Err(err) => {
                self.stats.write().corrupt_fallbacks += 1;
                warn!(key = %first_key, %err, "backend read failed, recomputing");
                self.do_query(query_fn, Some(options)).await
            }
        }
    }

    /// Run `mutation_fn` and invalidate `options.keys`.
    ///
    /// The mutation always runs first and its error propagates untouched. A
    /// `Some` payload round-trips through JSON exactly like a query result;
    /// `None` models a mutation with no meaningful payload. Either way the
    /// keys are only evicted, never repopulated: the next query against them
    /// recomputes.
    pub async fn mutate<T, V, F, Fut>(
        &self,
        mutation_fn: F,
        options: Option<&QueryOptions>,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        V: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Option<V>, ComputeError>>,
    {
        let value = mutation_fn().await.map_err(QueryCacheError::Compute)?;

        let result = match value {
            Some(value) => {
                let bytes = serde_json::to_vec(&value)?;
                Some(serde_json::from_slice(&bytes)?)
            }
            None => None,
        };

        if let Some(options) = options {
            self.check_backend_configured(options)?;
            self.evict(options.cache_kind, &options.keys).await;
        }
        Ok(result)
    }

    /// Invoke the computation and populate the cache from its result.
    ///
    /// Nothing is cached on failure. On success the serialized bytes are
    /// written back under every key with the effective TTL; backend write
    /// failures surface to the caller, so a write is either known good or
    /// reported.
    async fn do_query<T, V, F, Fut>(&self, query_fn: F, options: Option<&QueryOptions>) -> Result<T>
    where
        T: DeserializeOwned,
        V: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, ComputeError>>,
    {
        self.stats.write().recomputes += 1;

        let value = query_fn().await.map_err(QueryCacheError::Compute)?;
        let bytes = serde_json::to_vec(&value)?;
        let result: T = serde_json::from_slice(&bytes)?;

        let Some(options) = options else {
            return Ok(result);
        };
        if options.keys.is_empty() {
            return Ok(result);
        }

        let ttl = options.effective_ttl();
        let meta = EntryMeta {
            invalid_at: Instant::now() + ttl,
            sink: options.cache_kind,
        };
        {
            let mut index = self.index.write();
            for key in &options.keys {
                index.insert(key.clone(), meta);
            }
        }

        if !ttl.is_zero() {
            if let Some(backend) = options.cache_kind.and_then(|kind| self.backend(kind)) {
                for key in &options.keys {
                    backend.set(&fetch_key(key), &bytes, ttl).await?;
                }
                debug!(keys = ?options.keys, ?ttl, "cached query result");
            }
        }
        Ok(result)
    }

    /// Drop the metadata entries for `keys`, then their serialized values
    /// from the named backend. Idempotent; backend delete failures are logged
    /// and swallowed.
    async fn evict(&self, kind: Option<CacheKind>, keys: &[String]) {
        if keys.is_empty() {
            return;
        }
        {
            let mut index = self.index.write();
            for key in keys {
                index.remove(key);
            }
        }
        let Some(backend) = kind.and_then(|kind| self.backend(kind)) else {
            return;
        };
        for key in keys {
            if let Err(err) = backend.delete(&fetch_key(key)).await {
                warn!(key = %key, %err, "backend delete failed during eviction");
            }
        }
    }
}
