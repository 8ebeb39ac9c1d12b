//! # querycache
//!
//! Read-through / write-through caching coordinator for arbitrary, expensive
//! computations (database calls, remote APIs). Callers supply the computation
//! itself instead of a value, and the client decides per call whether to
//! serve a cached artifact or invoke it, memoizing results under one or more
//! logical keys in an in-process or Redis backend.
//!
//! ## Behavior highlights
//!
//! - Staleness is purely time-based: the enforced window is
//!   `min(cache_time, revalidate_time)`, applied to both the in-process
//!   metadata index and the backend TTL.
//! - Every value round-trips through JSON, on cache hits and misses alike,
//!   so shape mismatches surface as errors on the first call.
//! - Any anomaly while *reading* a cached value (miss, tampered bytes, wrong
//!   type) silently degrades to a recomputation; *write* failures surface.
//! - Mutations only evict; the next query repopulates.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use querycache::{CacheKind, MemoryBackend, QueryClient, QueryOptions};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> querycache::Result<()> {
//!     let client = QueryClient::builder()
//!         .memory(MemoryBackend::default())
//!         .build();
//!
//!     let options = QueryOptions::new(
//!         CacheKind::Memory,
//!         ["user:42"],
//!         Duration::from_secs(60),
//!     );
//!
//!     // First call invokes the closure; later calls inside the freshness
//!     // window are served from the backend.
//!     let profile: String = client
//!         .query(
//!             || async { Ok("loaded from the database".to_string()) },
//!             Some(&options),
//!         )
//!         .await?;
//!     println!("{profile}");
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod core;

pub use crate::backend::{CacheBackend, MemoryBackend, MemoryStats, RedisBackend};
pub use crate::config::{CacheConfig, MemoryConfig, RedisConfig};
pub use crate::core::client::{QueryClient, QueryClientBuilder};
pub use crate::core::error::{ComputeError, QueryCacheError, Result};
pub use crate::core::types::{CacheKind, IndexStats, QueryOptions};
