//! Redis cache implementation.

use crate::codec;
use crate::config::RedisConfig;
use crate::error::{CacheError, CacheResult};
use crate::namespace::Namespace;
use crate::traits::{CacheStore, MemoryCacheStore};
use crate::value::CacheValue;
use async_trait::async_trait;
use cachet_log::{debug, info};
use redis::{AsyncCommands, Client, RedisResult, Script, aio::ConnectionManager};
use std::future::Future;
use std::time::Duration;

/// Replace the value only while it still holds the expected payload.
const COMPARE_SET_SCRIPT: &str = r#"
    if redis.call("get", KEYS[1]) == ARGV[1] then
        if tonumber(ARGV[3]) > 0 then
            redis.call("set", KEYS[1], ARGV[2], "EX", ARGV[3])
        else
            redis.call("set", KEYS[1], ARGV[2])
        end
        return 1
    else
        return 0
    end
"#;

/// Delete the key only while it still holds the expected payload.
const COMPARE_DELETE_SCRIPT: &str = r#"
    if redis.call("get", KEYS[1]) == ARGV[1] then
        return redis.call("del", KEYS[1])
    else
        return 0
    end
"#;

/// Keys fetched per SCAN round trip.
const SCAN_COUNT: usize = 500;

/// Redis cache store.
///
/// Values are stored as codec payloads, so the compare operations can be
/// evaluated server-side by comparing payload strings inside a Lua script.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    namespace: Namespace,
    timeout: Duration,
    compare_set: Script,
    compare_delete: Script,
}

impl RedisCache {
    /// Driver name.
    pub const NAME: &'static str = "redis";

    /// Create a new Redis cache instance.
    ///
    /// # Arguments
    ///
    /// * `config` - Redis connection parameters
    /// * `namespace` - Key namespace
    /// * `timeout` - Connect and per-command timeout
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] when the server cannot be reached
    /// or rejects the credentials.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use cachet_cache::*;
    /// use std::time::Duration;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), CacheError> {
    ///     let config = RedisConfig::default();
    ///     let cache = RedisCache::new(config, Namespace::default(), Duration::from_secs(5)).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(
        config: RedisConfig,
        namespace: Namespace,
        timeout: Duration,
    ) -> CacheResult<Self> {
        let client = Client::open(config.url().as_str())
            .map_err(|e| CacheError::unavailable(Self::NAME, e.to_string()))?;

        let connection = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                CacheError::unavailable(
                    Self::NAME,
                    format!("connect to {}:{} timed out", config.host, config.port),
                )
            })?
            .map_err(|e| CacheError::unavailable(Self::NAME, e.to_string()))?;

        info!(
            "Connected to redis at {}:{} (db {})",
            config.host, config.port, config.db
        );

        Ok(Self {
            connection,
            namespace,
            timeout,
            compare_set: Script::new(COMPARE_SET_SCRIPT),
            compare_delete: Script::new(COMPARE_DELETE_SCRIPT),
        })
    }

    /// Whether the driver is compiled in.
    pub fn is_available() -> bool {
        cfg!(feature = "redis")
    }

    /// Get the underlying connection manager.
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// Bound a command by the configured timeout.
    async fn timed<T>(&self, command: impl Future<Output = RedisResult<T>>) -> CacheResult<T> {
        tokio::time::timeout(self.timeout, command)
            .await
            .map_err(|_| CacheError::Timeout)?
            .map_err(CacheError::from)
    }

    /// Every backend key matching `pattern`, via a SCAN cursor.
    async fn scan(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let mut conn = self.connection.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let mut cmd = redis::cmd("SCAN");
            cmd.arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT);

            let (next, batch): (u64, Vec<String>) = self.timed(cmd.query_async(&mut conn)).await?;
            keys.extend(batch);

            if next == 0 {
                return Ok(keys);
            }
            cursor = next;
        }
    }
}

/// Escape glob metacharacters so a literal string can be used in MATCH.
fn escape_glob(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Whole seconds for `EX`, or 0 for no expiry.
fn expire_seconds(ttl: Option<Duration>) -> u64 {
    crate::ttl::expiry_seconds(ttl).unwrap_or(0)
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<CacheValue>> {
        let key = self.namespace.key(key);
        let mut conn = self.connection.clone();

        let payload: Option<String> = self.timed(conn.get(&key)).await?;
        payload.as_deref().map(codec::decode).transpose()
    }

    async fn set(&self, key: &str, value: &CacheValue, ttl: Option<Duration>) -> CacheResult<bool> {
        let key = self.namespace.key(key);
        let payload = codec::encode(value)?;
        let mut conn = self.connection.clone();

        let mut cmd = redis::cmd("SET");
        cmd.arg(&key).arg(payload);
        let seconds = expire_seconds(ttl);
        if seconds > 0 {
            cmd.arg("EX").arg(seconds);
        }

        let _: () = self.timed(cmd.query_async(&mut conn)).await?;
        Ok(true)
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let key = self.namespace.key(key);
        let mut conn = self.connection.clone();

        let _: i64 = self.timed(conn.del(&key)).await?;
        Ok(true)
    }

    async fn clear(&self, outdated_only: bool) -> CacheResult<bool> {
        // Redis expires keys on its own
        if outdated_only {
            return Ok(true);
        }

        let pattern = format!("{}*", escape_glob(self.namespace.prefix()));
        let keys = self.scan(&pattern).await?;
        let mut conn = self.connection.clone();

        for chunk in keys.chunks(SCAN_COUNT) {
            let _: i64 = self.timed(conn.del(chunk.to_vec())).await?;
        }

        debug!("Cleared {} redis key(s) under '{}'", keys.len(), self.namespace.name());
        Ok(true)
    }

    async fn get_all_keys(&self, prefix: Option<&str>) -> CacheResult<Vec<String>> {
        let pattern = format!(
            "{}{}*",
            escape_glob(self.namespace.prefix()),
            escape_glob(prefix.unwrap_or(""))
        );
        let keys = self.scan(&pattern).await?;
        Ok(self.namespace.filter_keys(keys, prefix))
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}

#[async_trait]
impl MemoryCacheStore for RedisCache {
    async fn add(&self, key: &str, value: &CacheValue, ttl: Option<Duration>) -> CacheResult<bool> {
        let key = self.namespace.key(key);
        let payload = codec::encode(value)?;
        let mut conn = self.connection.clone();

        // SET NX for atomic set-if-absent
        let mut cmd = redis::cmd("SET");
        cmd.arg(&key).arg(payload).arg("NX");
        let seconds = expire_seconds(ttl);
        if seconds > 0 {
            cmd.arg("EX").arg(seconds);
        }

        let result: Option<String> = self.timed(cmd.query_async(&mut conn)).await?;
        Ok(result.is_some())
    }

    async fn compare_set(
        &self,
        key: &str,
        old: &CacheValue,
        new: &CacheValue,
        ttl: Option<Duration>,
    ) -> CacheResult<bool> {
        let key = self.namespace.key(key);
        let old = codec::encode(old)?;
        let new = codec::encode(new)?;
        let mut conn = self.connection.clone();

        let mut invocation = self.compare_set.key(&key);
        invocation.arg(old).arg(new).arg(expire_seconds(ttl));

        let result: i32 = self.timed(invocation.invoke_async(&mut conn)).await?;
        Ok(result == 1)
    }

    async fn compare_delete(&self, key: &str, value: &CacheValue) -> CacheResult<bool> {
        let key = self.namespace.key(key);
        let expected = codec::encode(value)?;
        let mut conn = self.connection.clone();

        let mut invocation = self.compare_delete.key(&key);
        invocation.arg(expected);

        let result: i32 = self.timed(invocation.invoke_async(&mut conn)).await?;
        Ok(result == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_glob() {
        assert_eq!(escape_glob("localhost:"), "localhost:");
        assert_eq!(escape_glob("a*b?[c]\\"), "a\\*b\\?\\[c\\]\\\\");
    }

    #[test]
    fn test_expire_seconds() {
        assert_eq!(expire_seconds(None), 0);
        assert_eq!(expire_seconds(Some(Duration::ZERO)), 0);
        assert_eq!(expire_seconds(Some(Duration::from_millis(200))), 1);
        assert_eq!(expire_seconds(Some(crate::ttl::HOUR)), 3600);
        assert_eq!(expire_seconds(Some(Duration::MAX)), 0);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        let config = RedisConfig {
            port: 1,
            ..RedisConfig::default()
        };
        let err = RedisCache::new(config, Namespace::default(), Duration::from_millis(500))
            .await
            .err()
            .unwrap();
        assert!(err.is_unavailable());
    }
}
