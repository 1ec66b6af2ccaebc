//! Memcached cache implementation.

use crate::config::MemcachedConfig;
use crate::error::{CacheError, CacheResult};
use crate::memcache_client::{self, MemcacheEngine};
use crate::namespace::Namespace;
use crate::traits::{CacheStore, MemoryCacheStore};
use crate::value::CacheValue;
use async_trait::async_trait;
use cachet_log::info;
use std::time::Duration;

/// Memcached cache store over a list of servers.
///
/// Keys are distributed over the servers by the client. Key listing and
/// `clear` visit every server.
#[derive(Clone)]
pub struct MemcachedCache {
    engine: MemcacheEngine<memcache::Client>,
}

impl MemcachedCache {
    /// Driver name.
    pub const NAME: &'static str = "memcached";

    /// Connect to every configured server.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] when the host list is empty or a
    /// server cannot be reached.
    pub async fn new(
        config: MemcachedConfig,
        namespace: Namespace,
        timeout: Duration,
    ) -> CacheResult<Self> {
        if config.hosts.is_empty() {
            return Err(CacheError::unavailable(Self::NAME, "no memcached hosts configured"));
        }

        let servers: Vec<(String, u16)> = config
            .hosts
            .into_iter()
            .map(|host| (host.host, host.port))
            .collect();
        let client = memcache_client::connect(Self::NAME, &servers, timeout).await?;

        info!("Connected to {} memcached server(s)", servers.len());

        Ok(Self {
            engine: MemcacheEngine::new(client, servers, namespace, timeout),
        })
    }

    /// Whether the driver is compiled in.
    pub fn is_available() -> bool {
        cfg!(feature = "memcached")
    }
}

#[async_trait]
impl CacheStore for MemcachedCache {
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
impl MemoryCacheStore for MemcachedCache {
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
