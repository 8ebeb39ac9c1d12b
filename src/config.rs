use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::backend::{MemoryBackend, RedisBackend};
use crate::core::client::QueryClient;

/// File-loadable cache coordinator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub memory: MemoryConfig,
    pub redis: Option<RedisConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub enabled: bool,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory: MemoryConfig {
                enabled: true,
                max_entries: 10_000,
            },
            redis: None,
        }
    }
}

impl CacheConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: CacheConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Construct the enabled backends and a client wired to them.
    pub async fn build_client(&self) -> crate::Result<QueryClient> {
        let mut builder = QueryClient::builder();
        if self.memory.enabled {
            builder = builder.memory(MemoryBackend::new(self.memory.max_entries));
        }
        if let Some(redis) = &self.redis {
            builder = builder.remote(RedisBackend::connect(&redis.url).await?);
        }
        Ok(builder.build())
    }
}
