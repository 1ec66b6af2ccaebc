//! Cache configuration types.

use crate::error::{CacheError, CacheResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Cache driver selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheDriver {
    /// In-process array, no TTL
    Array,
    /// Process-wide shared-memory store
    Apcu,
    /// Memcache, single host
    Memcache,
    /// Memcached, host list
    Memcached,
    /// Redis
    Redis,
    /// Relational database table
    Database,
}

impl CacheDriver {
    /// All drivers, in configuration order.
    pub const ALL: [CacheDriver; 6] = [
        CacheDriver::Array,
        CacheDriver::Apcu,
        CacheDriver::Memcache,
        CacheDriver::Memcached,
        CacheDriver::Redis,
        CacheDriver::Database,
    ];

    /// Configuration name of the driver.
    pub fn name(&self) -> &'static str {
        match self {
            CacheDriver::Array => "array",
            CacheDriver::Apcu => "apcu",
            CacheDriver::Memcache => "memcache",
            CacheDriver::Memcached => "memcached",
            CacheDriver::Redis => "redis",
            CacheDriver::Database => "database",
        }
    }

    /// Whether the driver offers `add`/`compare_set`/`compare_delete`.
    pub fn supports_memory_contract(&self) -> bool {
        !matches!(self, CacheDriver::Database)
    }
}

impl fmt::Display for CacheDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CacheDriver {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        CacheDriver::ALL
            .into_iter()
            .find(|driver| driver.name() == wanted)
            .ok_or_else(|| CacheError::Config(format!("Unknown cache driver: {}", s)))
    }
}

/// Memcache (single host) connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemcacheConfig {
    /// Host name of the memcache daemon
    #[serde(default = "default_host")]
    pub host: String,
    /// Port of the memcache daemon
    #[serde(default = "default_memcache_port")]
    pub port: u16,
}

impl Default for MemcacheConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_memcache_port(),
        }
    }
}

/// One memcached server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemcachedHost {
    /// Host name
    pub host: String,
    /// Port
    pub port: u16,
    /// Relative weight; kept for configuration compatibility, the client
    /// distributes keys evenly.
    #[serde(default)]
    pub weight: Option<u32>,
}

impl MemcachedHost {
    /// Create a host entry without weight.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            weight: None,
        }
    }

    /// Parse a `"host, port(, weight)"` entry.
    pub fn parse(entry: &str) -> CacheResult<Self> {
        let parts: Vec<&str> = entry.split(',').map(str::trim).collect();
        let invalid = || {
            CacheError::Config(format!(
                "Invalid memcached host '{}'. Expected 'host, port(, weight)'",
                entry
            ))
        };

        match parts.as_slice() {
            [host, port] | [host, port, _] if !host.is_empty() => {
                let port = port.parse().map_err(|_| invalid())?;
                let weight = match parts.get(2) {
                    Some(w) => Some(w.parse().map_err(|_| invalid())?),
                    None => None,
                };
                Ok(Self {
                    host: host.to_string(),
                    port,
                    weight,
                })
            }
            _ => Err(invalid()),
        }
    }

    /// `memcache://host:port` form.
    pub fn url(&self) -> String {
        format!("memcache://{}:{}", self.host, self.port)
    }
}

/// Memcached (host list) connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemcachedConfig {
    /// Servers
    #[serde(default = "default_memcached_hosts")]
    pub hosts: Vec<MemcachedHost>,
}

impl Default for MemcachedConfig {
    fn default() -> Self {
        Self {
            hosts: default_memcached_hosts(),
        }
    }
}

/// Redis connection parameters.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Host name of the redis daemon
    #[serde(default = "default_host")]
    pub host: String,
    /// Port of the redis daemon
    #[serde(default = "default_redis_port")]
    pub port: u16,
    /// Sub-database index (0-15)
    #[serde(default)]
    pub db: u8,
    /// Authentication password
    #[serde(default)]
    pub password: Option<String>,
}

impl RedisConfig {
    /// Connection URL, `redis://[:password@]host:port/db`.
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) if !password.is_empty() => format!(
                "redis://:{}@{}:{}/{}",
                urlencoding::encode(password),
                self.host,
                self.port,
                self.db
            ),
            _ => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_redis_port(),
            db: 0,
            password: None,
        }
    }
}

impl fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db", &self.db)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Database driver parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseCacheConfig {
    /// Cache table name
    #[serde(default = "default_table")]
    pub table: String,
}

impl Default for DatabaseCacheConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Selected driver
    #[serde(default = "default_driver")]
    pub driver: CacheDriver,

    /// Key namespace for shared backends
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Memcache parameters
    #[serde(default)]
    pub memcache: MemcacheConfig,

    /// Memcached parameters
    #[serde(default)]
    pub memcached: MemcachedConfig,

    /// Redis parameters
    #[serde(default)]
    pub redis: RedisConfig,

    /// Database parameters
    #[serde(default)]
    pub database: DatabaseCacheConfig,

    /// Upper bound for establishing a backend connection
    #[serde(default = "default_connection_timeout", with = "seconds")]
    pub connection_timeout: Duration,
}

fn default_driver() -> CacheDriver {
    CacheDriver::Database
}

fn default_namespace() -> String {
    "localhost".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_memcache_port() -> u16 {
    11211
}

fn default_redis_port() -> u16 {
    6379
}

fn default_memcached_hosts() -> Vec<MemcachedHost> {
    vec![MemcachedHost::new(default_host(), default_memcache_port())]
}

fn default_table() -> String {
    "cache".to_string()
}

fn default_connection_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(default_driver())
    }
}

impl CacheConfig {
    /// Configuration for `driver` with default parameters.
    pub fn new(driver: CacheDriver) -> Self {
        Self {
            driver,
            namespace: default_namespace(),
            memcache: MemcacheConfig::default(),
            memcached: MemcachedConfig::default(),
            redis: RedisConfig::default(),
            database: DatabaseCacheConfig::default(),
            connection_timeout: default_connection_timeout(),
        }
    }

    /// In-process array cache.
    ///
    /// # Examples
    ///
    /// ```
    /// use cachet_cache::{CacheConfig, CacheDriver};
    ///
    /// let config = CacheConfig::array();
    /// assert_eq!(config.driver, CacheDriver::Array);
    /// ```
    pub fn array() -> Self {
        Self::new(CacheDriver::Array)
    }

    /// Process-wide shared-memory cache.
    pub fn apcu() -> Self {
        Self::new(CacheDriver::Apcu)
    }

    /// Single-host memcache.
    pub fn memcache(host: impl Into<String>, port: u16) -> Self {
        let mut config = Self::new(CacheDriver::Memcache);
        config.memcache = MemcacheConfig {
            host: host.into(),
            port,
        };
        config
    }

    /// Memcached over a list of hosts.
    pub fn memcached(hosts: Vec<MemcachedHost>) -> Self {
        let mut config = Self::new(CacheDriver::Memcached);
        config.memcached = MemcachedConfig { hosts };
        config
    }

    /// Redis.
    ///
    /// # Examples
    ///
    /// ```
    /// use cachet_cache::CacheConfig;
    ///
    /// let config = CacheConfig::redis("localhost", 6379).with_redis_db(2);
    /// assert_eq!(config.redis.url(), "redis://localhost:6379/2");
    /// ```
    pub fn redis(host: impl Into<String>, port: u16) -> Self {
        let mut config = Self::new(CacheDriver::Redis);
        config.redis.host = host.into();
        config.redis.port = port;
        config
    }

    /// Database table.
    pub fn database() -> Self {
        Self::new(CacheDriver::Database)
    }

    /// Set the key namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the Redis sub-database.
    pub fn with_redis_db(mut self, db: u8) -> Self {
        self.redis.db = db;
        self
    }

    /// Set the Redis password.
    pub fn with_redis_password(mut self, password: impl Into<String>) -> Self {
        self.redis.password = Some(password.into());
        self
    }

    /// Set the database cache table name.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.database.table = table.into();
        self
    }

    /// Set the connection timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Create configuration from environment variables.
    ///
    /// Uses the following environment variables, all optional:
    /// - `CACHET_CACHE_DRIVER`: `array|apcu|memcache|memcached|redis|database`
    /// - `CACHET_NAMESPACE`: key namespace (default: `localhost`)
    /// - `CACHET_MEMCACHE_HOST`, `CACHET_MEMCACHE_PORT`
    /// - `CACHET_MEMCACHED_HOSTS`: `;`-separated `host, port(, weight)` entries
    /// - `CACHET_REDIS_HOST`, `CACHET_REDIS_PORT`, `CACHET_REDIS_DB`, `CACHET_REDIS_PASSWORD`
    /// - `CACHET_CACHE_TABLE`: database cache table
    /// - `CACHET_CACHE_CONNECT_TIMEOUT`: seconds
    pub fn from_env() -> CacheResult<Self> {
        let mut config = Self::default();

        if let Ok(driver) = std::env::var("CACHET_CACHE_DRIVER") {
            config.driver = driver.parse()?;
        }

        if let Ok(namespace) = std::env::var("CACHET_NAMESPACE") {
            config.namespace = namespace;
        }

        if let Ok(host) = std::env::var("CACHET_MEMCACHE_HOST") {
            config.memcache.host = host;
        }

        if let Ok(port) = std::env::var("CACHET_MEMCACHE_PORT") {
            config.memcache.port = parse_env("CACHET_MEMCACHE_PORT", &port)?;
        }

        if let Ok(hosts) = std::env::var("CACHET_MEMCACHED_HOSTS") {
            config.memcached.hosts = hosts
                .split(';')
                .filter(|entry| !entry.trim().is_empty())
                .map(MemcachedHost::parse)
                .collect::<CacheResult<_>>()?;
        }

        if let Ok(host) = std::env::var("CACHET_REDIS_HOST") {
            config.redis.host = host;
        }

        if let Ok(port) = std::env::var("CACHET_REDIS_PORT") {
            config.redis.port = parse_env("CACHET_REDIS_PORT", &port)?;
        }

        if let Ok(db) = std::env::var("CACHET_REDIS_DB") {
            config.redis.db = parse_env("CACHET_REDIS_DB", &db)?;
        }

        if let Ok(password) = std::env::var("CACHET_REDIS_PASSWORD") {
            config.redis.password = Some(password).filter(|p| !p.is_empty());
        }

        if let Ok(table) = std::env::var("CACHET_CACHE_TABLE") {
            config.database.table = table;
        }

        if let Ok(timeout) = std::env::var("CACHET_CACHE_CONNECT_TIMEOUT") {
            config.connection_timeout =
                Duration::from_secs(parse_env("CACHET_CACHE_CONNECT_TIMEOUT", &timeout)?);
        }

        Ok(config)
    }
}

fn parse_env<T: FromStr>(name: &str, raw: &str) -> CacheResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| CacheError::Config(format!("Invalid {}: {}", name, raw)))
}

/// Durations as whole seconds.
mod seconds {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_parse() {
        assert_eq!("redis".parse::<CacheDriver>().unwrap(), CacheDriver::Redis);
        assert_eq!(" APCu ".parse::<CacheDriver>().unwrap(), CacheDriver::Apcu);
        assert!("mongodb".parse::<CacheDriver>().is_err());
    }

    #[test]
    fn test_driver_display_roundtrip() {
        for driver in CacheDriver::ALL {
            assert_eq!(driver.to_string().parse::<CacheDriver>().unwrap(), driver);
        }
    }

    #[test]
    fn test_memory_contract_support() {
        assert!(CacheDriver::Array.supports_memory_contract());
        assert!(CacheDriver::Redis.supports_memory_contract());
        assert!(!CacheDriver::Database.supports_memory_contract());
    }

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.driver, CacheDriver::Database);
        assert_eq!(config.namespace, "localhost");
        assert_eq!(config.memcache.port, 11211);
        assert_eq!(config.memcached.hosts, vec![MemcachedHost::new("127.0.0.1", 11211)]);
        assert_eq!(config.redis.port, 6379);
        assert_eq!(config.database.table, "cache");
        assert_eq!(config.connection_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_memcached_host_parse() {
        let host = MemcachedHost::parse("127.0.0.1, 11211").unwrap();
        assert_eq!(host, MemcachedHost::new("127.0.0.1", 11211));

        let weighted = MemcachedHost::parse("cache1,11212,3").unwrap();
        assert_eq!(weighted.weight, Some(3));
        assert_eq!(weighted.url(), "memcache://cache1:11212");

        assert!(MemcachedHost::parse("127.0.0.1").is_err());
        assert!(MemcachedHost::parse("127.0.0.1, port").is_err());
        assert!(MemcachedHost::parse(", 11211").is_err());
    }

    #[test]
    fn test_redis_url() {
        let config = CacheConfig::redis("redis.local", 6380);
        assert_eq!(config.redis.url(), "redis://redis.local:6380/0");

        let config = config.with_redis_db(3).with_redis_password("p@ss word");
        assert_eq!(config.redis.url(), "redis://:p%40ss%20word@redis.local:6380/3");
    }

    #[test]
    fn test_redis_password_not_in_debug() {
        let config = CacheConfig::redis("localhost", 6379).with_redis_password("secret");
        assert!(!format!("{:?}", config).contains("secret"));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: CacheConfig = serde_json::from_str(
            r#"{"driver":"memcached","memcached":{"hosts":[{"host":"m1","port":11211}]},"connection_timeout":2}"#,
        )
        .unwrap();
        assert_eq!(config.driver, CacheDriver::Memcached);
        assert_eq!(config.memcached.hosts[0].host, "m1");
        assert_eq!(config.connection_timeout, Duration::from_secs(2));
        assert_eq!(config.namespace, "localhost");
    }

    #[test]
    fn test_builder() {
        let config = CacheConfig::database()
            .with_namespace("example.org")
            .with_table("kv_cache")
            .with_connection_timeout(Duration::from_secs(1));
        assert_eq!(config.namespace, "example.org");
        assert_eq!(config.database.table, "kv_cache");
        assert_eq!(config.connection_timeout, Duration::from_secs(1));
    }
}
