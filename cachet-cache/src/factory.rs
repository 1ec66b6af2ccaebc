//! Driver selection and construction.

use crate::array_cache::ArrayCache;
use crate::config::{CacheConfig, CacheDriver};
use crate::error::{CacheError, CacheResult};
use crate::namespace::Namespace;
use crate::traits::{CacheStore, MemoryCacheStore};
use crate::value::CacheValue;
use async_trait::async_trait;
use cachet_log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "apcu")]
use crate::apcu_cache::ApcuCache;
#[cfg(feature = "database")]
use crate::database_cache::DatabaseCache;
#[cfg(feature = "memcache")]
use crate::memcache_cache::MemcacheCache;
#[cfg(feature = "memcached")]
use crate::memcached_cache::MemcachedCache;
#[cfg(feature = "redis")]
use crate::redis_cache::RedisCache;

/// A constructed driver, tagged with its capability set.
#[derive(Clone)]
pub enum CacheClient {
    /// Driver with atomic `add`/`compare_set`/`compare_delete`
    Memory(Arc<dyn MemoryCacheStore>),
    /// Driver offering the base contract only
    Plain(Arc<dyn CacheStore>),
}

impl CacheClient {
    /// The read-modify-write view, if the driver has one.
    pub fn memory(&self) -> Option<Arc<dyn MemoryCacheStore>> {
        match self {
            CacheClient::Memory(store) => Some(store.clone()),
            CacheClient::Plain(_) => None,
        }
    }

    /// Whether the driver offers the memory-cache operations.
    pub fn is_memory(&self) -> bool {
        matches!(self, CacheClient::Memory(_))
    }

    /// The base contract, whatever the capability set.
    pub fn store(&self) -> &dyn CacheStore {
        match self {
            CacheClient::Memory(store) => store.as_ref(),
            CacheClient::Plain(store) => store.as_ref(),
        }
    }
}

impl std::fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_memory() { "Memory" } else { "Plain" };
        f.debug_tuple(kind).field(&self.store().name()).finish()
    }
}

#[async_trait]
impl CacheStore for CacheClient {
    async fn get(&self, key: &str) -> CacheResult<Option<CacheValue>> {
        self.store().get(key).await
    }

    async fn set(&self, key: &str, value: &CacheValue, ttl: Option<Duration>) -> CacheResult<bool> {
        self.store().set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.store().delete(key).await
    }

    async fn clear(&self, outdated_only: bool) -> CacheResult<bool> {
        self.store().clear(outdated_only).await
    }

    async fn get_all_keys(&self, prefix: Option<&str>) -> CacheResult<Vec<String>> {
        self.store().get_all_keys(prefix).await
    }

    fn name(&self) -> &'static str {
        self.store().name()
    }
}

/// Builds the configured cache driver.
///
/// # Examples
///
/// ```
/// use cachet_cache::*;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), CacheError> {
/// let cache = CacheFactory::new(CacheConfig::array()).create().await?;
/// assert!(cache.is_memory());
///
/// cache.set("value1", &"foobar".into(), None).await?;
/// assert_eq!(cache.get("value1").await?, Some(CacheValue::from("foobar")));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CacheFactory {
    config: CacheConfig,
    #[cfg(feature = "database")]
    database: Option<sea_orm::DatabaseConnection>,
}

impl CacheFactory {
    /// Create a factory for `config`.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            #[cfg(feature = "database")]
            database: None,
        }
    }

    /// Hand in the connection the database driver should use.
    #[cfg(feature = "database")]
    pub fn with_database(mut self, conn: sea_orm::DatabaseConnection) -> Self {
        self.database = Some(conn);
        self
    }

    /// The configuration this factory builds from.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Whether `driver` is compiled into this build.
    pub fn is_available(driver: CacheDriver) -> bool {
        match driver {
            CacheDriver::Array => true,
            CacheDriver::Apcu => cfg!(feature = "apcu"),
            CacheDriver::Memcache => cfg!(feature = "memcache"),
            CacheDriver::Memcached => cfg!(feature = "memcached"),
            CacheDriver::Redis => cfg!(feature = "redis"),
            CacheDriver::Database => cfg!(feature = "database"),
        }
    }

    /// Build the configured driver.
    pub async fn create(&self) -> CacheResult<CacheClient> {
        self.create_driver(self.config.driver).await
    }

    /// Build `driver` with the parameters from the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] when the driver is not compiled in
    /// or its backend cannot be reached within the connection timeout.
    pub async fn create_driver(&self, driver: CacheDriver) -> CacheResult<CacheClient> {
        let result = self.build(driver).await;

        match &result {
            Ok(client) => info!(
                "Cache driver '{}' ready (namespace '{}')",
                client.name(),
                self.config.namespace
            ),
            Err(e) if e.is_unavailable() => warn!("{}", e),
            Err(_) => {}
        }

        result
    }

    async fn build(&self, driver: CacheDriver) -> CacheResult<CacheClient> {
        let namespace = Namespace::try_new(self.config.namespace.as_str())?;
        let timeout = self.config.connection_timeout;

        let client = match driver {
            CacheDriver::Array => CacheClient::Memory(Arc::new(ArrayCache::new())),

            #[cfg(feature = "apcu")]
            CacheDriver::Apcu => CacheClient::Memory(Arc::new(ApcuCache::new(namespace))),

            #[cfg(feature = "memcache")]
            CacheDriver::Memcache => {
                let cache =
                    MemcacheCache::new(self.config.memcache.clone(), namespace, timeout).await?;
                CacheClient::Memory(Arc::new(cache))
            }

            #[cfg(feature = "memcached")]
            CacheDriver::Memcached => {
                let cache =
                    MemcachedCache::new(self.config.memcached.clone(), namespace, timeout).await?;
                CacheClient::Memory(Arc::new(cache))
            }

            #[cfg(feature = "redis")]
            CacheDriver::Redis => {
                let cache = RedisCache::new(self.config.redis.clone(), namespace, timeout).await?;
                CacheClient::Memory(Arc::new(cache))
            }

            #[cfg(feature = "database")]
            CacheDriver::Database => {
                let conn = self.database.clone().ok_or_else(|| {
                    CacheError::unavailable(driver.name(), "no database connection configured")
                })?;

                let cache = DatabaseCache::new(conn, self.config.database.clone(), namespace);
                cache
                    .ensure_schema()
                    .await
                    .map_err(|e| CacheError::unavailable(driver.name(), e.to_string()))?;
                CacheClient::Plain(Arc::new(cache))
            }

            #[allow(unreachable_patterns)]
            other => {
                let _ = (namespace, timeout);
                return Err(CacheError::unavailable(other.name(), "driver not compiled in"));
            }
        };

        Ok(client)
    }
}
