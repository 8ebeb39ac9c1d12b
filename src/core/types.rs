use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Which backend physically holds a serialized value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    /// In-process TTL map.
    Memory,
    /// Remote key-value store (Redis).
    Remote,
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

/// Per-call caching configuration. Not persisted.
///
/// Staleness for a multi-key call is decided from `keys[0]` only, while the
/// result is cached and evicted under every key. All keys passed in one
/// options value must therefore share one lifecycle; keys that need to
/// expire independently belong in separate calls.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Logical keys the result is stored under. Empty disables caching for
    /// the call entirely.
    pub keys: Vec<String>,
    /// How long the serialized value may live in the backend.
    pub cache_time: Duration,
    /// How long the metadata index considers the entry fresh before forcing
    /// a recomputation.
    pub revalidate_time: Duration,
    /// Accepted for API compatibility; no retry loop consults it.
    pub retries: u32,
    /// Backend the serialized value is written to. `None` tracks the entry
    /// in the metadata index without persisting bytes anywhere.
    pub cache_kind: Option<CacheKind>,
}

impl QueryOptions {
    /// Options caching under `keys` in the given backend, with both freshness
    /// windows set to `ttl`.
    pub fn new(
        kind: CacheKind,
        keys: impl IntoIterator<Item = impl Into<String>>,
        ttl: Duration,
    ) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            cache_time: ttl,
            revalidate_time: ttl,
            cache_kind: Some(kind),
            ..Self::default()
        }
    }

    /// The single freshness window actually enforced, for both the metadata
    /// index expiry and the backend TTL. Keeping the two clocks on one value
    /// prevents either path from serving a value the other considers stale.
    pub fn effective_ttl(&self) -> Duration {
        self.cache_time.min(self.revalidate_time)
    }
}

/// Metadata index entry for one logical key. Tracks freshness and which
/// backend holds the serialized value, never the value itself.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EntryMeta {
    /// Absolute time after which the entry is stale regardless of the
    /// backend's own TTL.
    pub invalid_at: Instant,
    /// Backend holding the serialized value, if any.
    pub sink: Option<CacheKind>,
}

impl EntryMeta {
    pub fn is_stale(&self) -> bool {
        self.invalid_at < Instant::now()
    }
}

/// Counters maintained by the orchestrator. Observational only; the control
/// flow never consults them.
#[derive(Debug, Default, Clone, Serialize)]
pub struct IndexStats {
    /// Queries served from a backend.
    pub hits: u64,
    /// Queries with no metadata entry for the first key.
    pub misses: u64,
    /// Entries evicted because their freshness window had passed.
    pub stale_evictions: u64,
    /// Invocations of the caller's query function.
    pub recomputes: u64,
    /// Backend read anomalies that degraded to a recomputation.
    pub corrupt_fallbacks: u64,
}

impl IndexStats {
    /// Hit rate over queries that consulted the metadata index.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
