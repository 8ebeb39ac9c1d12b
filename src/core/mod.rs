pub mod client;
pub mod error;
pub mod types;

pub use client::{QueryClient, QueryClientBuilder};
pub use error::{ComputeError, QueryCacheError, Result};
pub use types::{CacheKind, IndexStats, QueryOptions};
