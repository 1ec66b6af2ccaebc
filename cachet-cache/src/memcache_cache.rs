//! Memcache driver for a single daemon.

use crate::config::MemcacheConfig;
use crate::error::CacheResult;
use crate::memcache_client::{self, MemcacheEngine};
use crate::namespace::Namespace;
use crate::traits::{CacheStore, MemoryCacheStore};
use crate::value::CacheValue;
use async_trait::async_trait;
use cachet_log::info;
use std::time::Duration;

/// Memcache cache store talking to a single daemon.
///
/// A transport failure discards the pooled connection and the next call
/// reconnects.
#[derive(Clone)]
pub struct MemcacheCache {
    engine: MemcacheEngine<memcache::Client>,
}

impl MemcacheCache {
    /// Driver name.
    pub const NAME: &'static str = "memcache";

    /// Connect to the configured daemon.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`](crate::CacheError::Unavailable)
    /// when the daemon cannot be reached.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use cachet_cache::*;
    /// use std::time::Duration;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), CacheError> {
    ///     let config = MemcacheConfig::default();
    ///     let cache = MemcacheCache::new(config, Namespace::default(), Duration::from_secs(5)).await?;
    ///     cache.set("greeting", &"hello".into(), None).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(
        config: MemcacheConfig,
        namespace: Namespace,
        timeout: Duration,
    ) -> CacheResult<Self> {
        let servers = vec![(config.host, config.port)];
        let client = memcache_client::connect(Self::NAME, &servers, timeout).await?;

        info!("Connected to memcache at {}:{}", servers[0].0, servers[0].1);

        Ok(Self {
            engine: MemcacheEngine::new(client, servers, namespace, timeout),
        })
    }

    /// Whether the driver is compiled in.
    pub fn is_available() -> bool {
        cfg!(feature = "memcache")
    }
}

#[async_trait]
impl CacheStore for MemcacheCache {
    async fn get(&self, key: &str) -> CacheResult<Option<CacheValue>> {
        self.engine.get(key).await
    }

    async fn set(&self, key: &str, value: &CacheValue, ttl: Option<Duration>) -> CacheResult<bool> {
        self.engine.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.engine.delete(key).await
    }

    async fn clear(&self, outdated_only: bool) -> CacheResult<bool> {
        self.engine.clear(outdated_only).await
    }

    async fn get_all_keys(&self, prefix: Option<&str>) -> CacheResult<Vec<String>> {
        self.engine.get_all_keys(prefix).await
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}

#[async_trait]
impl MemoryCacheStore for MemcacheCache {
    async fn add(&self, key: &str, value: &CacheValue, ttl: Option<Duration>) -> CacheResult<bool> {
        self.engine.add(key, value, ttl).await
    }

    async fn compare_set(
        &self,
        key: &str,
        old: &CacheValue,
        new: &CacheValue,
        ttl: Option<Duration>,
    ) -> CacheResult<bool> {
        self.engine.compare_set(key, old, new, ttl).await
    }

    async fn compare_delete(&self, key: &str, value: &CacheValue) -> CacheResult<bool> {
        self.engine.compare_delete(key, value).await
    }
}
