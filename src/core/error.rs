use thiserror::Error;

use super::types::CacheKind;

/// Boxed error produced by a caller-supplied query or mutation function.
pub type ComputeError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for cache coordinator operations.
///
/// Read-side backend anomalies (miss, wrong type, corrupt payload) are never
/// surfaced through this enum; they degrade to a recomputation instead.
#[derive(Debug, Error)]
pub enum QueryCacheError {
    /// The per-call options named a backend that was not supplied at
    /// construction time.
    #[error("no {0} cache backend configured")]
    BackendNotConfigured(CacheKind),

    /// The caller-supplied query or mutation function failed. Nothing is
    /// cached when this happens.
    #[error("query function failed: {0}")]
    Compute(#[source] ComputeError),

    /// The computed value could not be marshaled, or its serialized form
    /// could not be unmarshaled into the caller's result shape.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A backend write or connection failed.
    #[error("cache backend error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for QueryCacheError {
    fn from(err: redis::RedisError) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Result type alias for cache coordinator operations.
pub type Result<T> = std::result::Result<T, QueryCacheError>;
