//! Storage backends for serialized query results.
//!
//! The orchestrator speaks to every backend through [`CacheBackend`]; an
//! in-process TTL map and a Redis client are provided, and callers may plug
//! in their own.

pub mod memory;
pub mod redis;

pub use self::memory::{MemoryBackend, MemoryStats};
pub use self::redis::RedisBackend;

use crate::core::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Contract every cache backend honors.
///
/// A zero `ttl` on [`set`](CacheBackend::set) means "do not persist"; the
/// backend must not store the value at all rather than storing it forever.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch the serialized value for `key`. `Ok(None)` is a miss.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key` for at most `ttl`.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Remove `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}
