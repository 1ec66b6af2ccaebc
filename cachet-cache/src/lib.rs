//! Pluggable cache layer.
//!
//! Provides one interface over several cache backends: an in-process array,
//! a process-wide shared-memory store, memcache (one daemon or a server list,
//! both on the `memcache` crate), Redis and a relational database table.
//!
//! Every driver implements [`CacheStore`]. Drivers with real atomic
//! read-modify-write also implement [`MemoryCacheStore`] (`add`,
//! `compare_set`, `compare_delete`); the database driver does not.
//! [`CacheFactory`] builds the configured driver and reports which of the
//! two it got through [`CacheClient`].
//!
//! # Features
//!
//! - `apcu` - Process-wide shared-memory driver (enabled by default)
//! - `memcache` - Single-daemon memcache driver (enabled by default)
//! - `memcached` - Memcached driver over a server list (requires explicit opt-in)
//! - `redis` - Redis driver (enabled by default)
//! - `database` - Database driver on SeaORM; pick a backend with
//!   `database-sqlite` (default), `database-postgres` or `database-mysql`
//!
//! # Examples
//!
//! ## Array Cache
//!
//! ```
//! use cachet_cache::*;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), CacheError> {
//! let cache = ArrayCache::new();
//!
//! cache.set("value1", &"foobar".into(), None).await?;
//! assert_eq!(cache.get("value1").await?, Some(CacheValue::from("foobar")));
//!
//! assert!(cache.add("counter", &CacheValue::Int(1), None).await?);
//! assert!(cache.compare_set("counter", &CacheValue::Int(1), &CacheValue::Int(2), None).await?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Redis Cache
//!
//! ```no_run
//! use cachet_cache::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), CacheError> {
//!     let config = CacheConfig::redis("localhost", 6379).with_namespace("myhost");
//!     let cache = CacheFactory::new(config).create().await?;
//!
//!     cache.set("key", &"value".into(), Some(ttl::HOUR)).await?;
//!
//!     if let Some(memory) = cache.memory() {
//!         memory.compare_delete("key", &"value".into()).await?;
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Database Cache
//!
//! ```no_run
//! use cachet_cache::*;
//!
//! # async fn example(conn: sea_orm::DatabaseConnection) -> Result<(), CacheError> {
//! let cache = CacheFactory::new(CacheConfig::database())
//!     .with_database(conn)
//!     .create()
//!     .await?;
//!
//! assert!(!cache.is_memory());
//! cache.clear(true).await?;
//! # Ok(())
//! # }
//! ```

pub mod array_cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod factory;
pub mod helpers;
pub mod lock;
pub mod namespace;
pub mod traits;
pub mod ttl;
pub mod value;

#[cfg(feature = "apcu")]
pub mod apcu_cache;

#[cfg(feature = "memcache")]
mod memcache_client;

#[cfg(feature = "memcache")]
pub mod memcache_protocol;

#[cfg(feature = "memcache")]
pub mod memcache_cache;

#[cfg(feature = "memcached")]
pub mod memcached_cache;

#[cfg(feature = "redis")]
pub mod redis_cache;

#[cfg(feature = "database")]
pub mod database_cache;

pub use array_cache::ArrayCache;
pub use config::{
    CacheConfig, CacheDriver, DatabaseCacheConfig, MemcacheConfig, MemcachedConfig,
    MemcachedHost, RedisConfig,
};
pub use error::{CacheError, CacheResult};
pub use factory::{CacheClient, CacheFactory};
pub use helpers::*;
pub use lock::CacheLock;
pub use namespace::Namespace;
pub use traits::{CacheStore, MemoryCacheStore};
pub use value::CacheValue;

#[cfg(feature = "apcu")]
pub use apcu_cache::ApcuCache;

#[cfg(feature = "memcache")]
pub use memcache_cache::MemcacheCache;

#[cfg(feature = "memcached")]
pub use memcached_cache::MemcachedCache;

#[cfg(feature = "redis")]
pub use redis_cache::RedisCache;

#[cfg(feature = "database")]
pub use database_cache::DatabaseCache;

#[cfg(feature = "database")]
pub use sea_orm;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::array_cache::ArrayCache;
    pub use crate::config::{CacheConfig, CacheDriver};
    pub use crate::error::{CacheError, CacheResult};
    pub use crate::factory::{CacheClient, CacheFactory};
    pub use crate::lock::CacheLock;
    pub use crate::traits::{CacheStore, MemoryCacheStore};
    pub use crate::ttl;
    pub use crate::value::CacheValue;

    #[cfg(feature = "apcu")]
    pub use crate::apcu_cache::ApcuCache;

    #[cfg(feature = "memcache")]
    pub use crate::memcache_cache::MemcacheCache;

    #[cfg(feature = "memcached")]
    pub use crate::memcached_cache::MemcachedCache;

    #[cfg(feature = "redis")]
    pub use crate::redis_cache::RedisCache;

    #[cfg(feature = "database")]
    pub use crate::database_cache::DatabaseCache;
}
