//! Shared engine of the memcache drivers.
//!
//! The `memcache` crate doesn't have native async support, so every call
//! runs on the blocking pool behind a tokio Mutex, bounded by the driver
//! timeout. Reconnects are handled by the crate's per-server pool.

use crate::codec;
use crate::error::{CacheError, CacheResult};
use crate::memcache_protocol;
use crate::namespace::Namespace;
use crate::value::CacheValue;
use cachet_log::{debug, warn};
use memcache::MemcacheError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// `gets` result: payload, flags, CAS token.
type CasEntry = (Vec<u8>, u32, Option<u64>);

/// Blocking client calls the memcache drivers are built on.
///
/// `false` from [`store_if_absent`](Self::store_if_absent) and
/// [`swap`](Self::swap) means the precondition failed, not an error.
pub trait MemcacheClient: Send + 'static {
    /// Fetch one payload.
    fn fetch(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Fetch one payload together with its CAS token.
    fn fetch_with_token(&self, key: &str) -> CacheResult<Option<(Vec<u8>, u64)>>;

    /// Unconditional write.
    fn store(&self, key: &str, payload: &[u8], exptime: u32) -> CacheResult<()>;

    /// Write only if the key is absent.
    fn store_if_absent(&self, key: &str, payload: &[u8], exptime: u32) -> CacheResult<bool>;

    /// Write only if the key still carries `token`.
    fn swap(&self, key: &str, payload: &[u8], exptime: u32, token: u64) -> CacheResult<bool>;

    fn remove(&self, key: &str) -> CacheResult<()>;

    /// Drop every item on every server.
    fn flush_all(&self) -> CacheResult<()>;
}

impl MemcacheClient for memcache::Client {
    fn fetch(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(self.get::<Vec<u8>>(key)?)
    }

    fn fetch_with_token(&self, key: &str) -> CacheResult<Option<(Vec<u8>, u64)>> {
        let mut found = self.gets::<CasEntry>(&[key])?;
        match found.remove(key) {
            Some((data, _, Some(token))) => Ok(Some((data, token))),
            Some((_, _, None)) => Err(CacheError::Protocol("gets reply without cas token".into())),
            None => Ok(None),
        }
    }

    fn store(&self, key: &str, payload: &[u8], exptime: u32) -> CacheResult<()> {
        Ok(self.set(key, payload, exptime)?)
    }

    fn store_if_absent(&self, key: &str, payload: &[u8], exptime: u32) -> CacheResult<bool> {
        match self.add(key, payload, exptime) {
            Ok(()) => Ok(true),
            // Key exists
            Err(MemcacheError::CommandError(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn swap(&self, key: &str, payload: &[u8], exptime: u32, token: u64) -> CacheResult<bool> {
        match self.cas(key, payload, exptime, token) {
            Ok(swapped) => Ok(swapped),
            // Token changed or key gone
            Err(MemcacheError::CommandError(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        self.delete(key)?;
        Ok(())
    }

    fn flush_all(&self) -> CacheResult<()> {
        Ok(self.flush()?)
    }
}

/// Connect a `memcache` client to `servers`, each a `(host, port)` pair.
pub(crate) async fn connect(
    driver: &'static str,
    servers: &[(String, u16)],
    timeout: Duration,
) -> CacheResult<memcache::Client> {
    if servers.is_empty() {
        return Err(CacheError::unavailable(driver, "no memcache servers configured"));
    }

    let urls: Vec<String> = servers
        .iter()
        .map(|(host, port)| {
            format!("memcache://{}:{}?timeout={}", host, port, timeout.as_secs_f64())
        })
        .collect();

    let connecting = tokio::task::spawn_blocking(move || memcache::connect(urls));
    tokio::time::timeout(timeout, connecting)
        .await
        .map_err(|_| CacheError::unavailable(driver, "connect timed out"))?
        .map_err(|e| CacheError::Other(format!("Task join error: {}", e)))?
        .map_err(|e| CacheError::unavailable(driver, e.to_string()))
}

/// Cache logic on top of a [`MemcacheClient`].
pub(crate) struct MemcacheEngine<C> {
    client: Arc<Mutex<C>>,
    servers: Vec<(String, u16)>,
    namespace: Namespace,
    timeout: Duration,
}

impl<C> Clone for MemcacheEngine<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            servers: self.servers.clone(),
            namespace: self.namespace.clone(),
            timeout: self.timeout,
        }
    }
}

impl<C: MemcacheClient> MemcacheEngine<C> {
    pub(crate) fn new(
        client: C,
        servers: Vec<(String, u16)>,
        namespace: Namespace,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Arc::new(Mutex::new(client)),
            servers,
            namespace,
            timeout,
        }
    }

    fn backend_key(&self, key: &str) -> CacheResult<String> {
        memcache_protocol::encode_key(&self.namespace.key(key))
    }

    /// Run a blocking client call off the async runtime.
    async fn blocking<T, F>(&self, op: F) -> CacheResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&C) -> CacheResult<T> + Send + 'static,
    {
        let client = self.client.clone();
        let task = tokio::task::spawn_blocking(move || {
            let client = client.blocking_lock();
            op(&client)
        });

        tokio::time::timeout(self.timeout, task)
            .await
            .map_err(|_| CacheError::Timeout)?
            .map_err(|e| CacheError::Other(format!("Task join error: {}", e)))?
    }

    /// Backend keys of this namespace, gathered from every server.
    async fn namespace_keys(&self) -> CacheResult<Vec<String>> {
        let mut dumped = Vec::new();
        for (host, port) in &self.servers {
            let dump = memcache_protocol::metadump(host, *port);
            let keys = tokio::time::timeout(self.timeout, dump)
                .await
                .map_err(|_| CacheError::Timeout)??;
            dumped.extend(keys);
        }
        Ok(self.namespace.filter_keys(dumped, None))
    }

    pub(crate) async fn get(&self, key: &str) -> CacheResult<Option<CacheValue>> {
        let key = self.backend_key(key)?;
        let data = self.blocking(move |client| client.fetch(&key)).await?;
        data.map(|bytes| codec::decode_bytes(&bytes)).transpose()
    }

    pub(crate) async fn set(
        &self,
        key: &str,
        value: &CacheValue,
        ttl: Option<Duration>,
    ) -> CacheResult<bool> {
        let key = self.backend_key(key)?;
        let payload = codec::encode(value)?;
        let exptime = memcache_protocol::expiration(ttl);

        self.blocking(move |client| client.store(&key, payload.as_bytes(), exptime))
            .await?;
        Ok(true)
    }

    pub(crate) async fn delete(&self, key: &str) -> CacheResult<bool> {
        let key = self.backend_key(key)?;
        self.blocking(move |client| client.remove(&key)).await?;
        Ok(true)
    }

    pub(crate) async fn clear(&self, outdated_only: bool) -> CacheResult<bool> {
        // Servers evict expired items on their own
        if outdated_only {
            return Ok(true);
        }

        let keys = match self.namespace_keys().await {
            Ok(keys) => keys,
            Err(CacheError::Protocol(reason)) => {
                warn!("Key listing unsupported ({}), flushing all memcache servers", reason);
                self.blocking(|client| client.flush_all()).await?;
                return Ok(true);
            }
            Err(e) => return Err(e),
        };

        debug!("Clearing {} memcache key(s) under '{}'", keys.len(), self.namespace.name());
        for key in keys {
            self.delete(&key).await?;
        }
        Ok(true)
    }

    pub(crate) async fn get_all_keys(&self, prefix: Option<&str>) -> CacheResult<Vec<String>> {
        let keys = self.namespace_keys().await?;
        Ok(crate::namespace::filter_by_prefix(keys, prefix))
    }

    pub(crate) async fn add(
        &self,
        key: &str,
        value: &CacheValue,
        ttl: Option<Duration>,
    ) -> CacheResult<bool> {
        let key = self.backend_key(key)?;
        let payload = codec::encode(value)?;
        let exptime = memcache_protocol::expiration(ttl);

        self.blocking(move |client| client.store_if_absent(&key, payload.as_bytes(), exptime))
            .await
    }

    /// Current payload and token of `key` if it decodes to `expected`.
    async fn matching(
        &self,
        key: &str,
        expected: &CacheValue,
    ) -> CacheResult<Option<(Vec<u8>, u64)>> {
        let lookup = key.to_string();
        let Some((current, token)) = self
            .blocking(move |client| client.fetch_with_token(&lookup))
            .await?
        else {
            return Ok(None);
        };

        if codec::decode_bytes(&current)? != *expected {
            return Ok(None);
        }
        Ok(Some((current, token)))
    }

    pub(crate) async fn compare_set(
        &self,
        key: &str,
        old: &CacheValue,
        new: &CacheValue,
        ttl: Option<Duration>,
    ) -> CacheResult<bool> {
        let key = self.backend_key(key)?;
        let Some((_, token)) = self.matching(&key, old).await? else {
            return Ok(false);
        };

        let payload = codec::encode(new)?;
        let exptime = memcache_protocol::expiration(ttl);
        self.blocking(move |client| client.swap(&key, payload.as_bytes(), exptime, token))
            .await
    }

    /// No conditional delete exists: CAS-write the same payload with an
    /// expiry in the past.
    pub(crate) async fn compare_delete(&self, key: &str, value: &CacheValue) -> CacheResult<bool> {
        let key = self.backend_key(key)?;
        let Some((current, token)) = self.matching(&key, value).await? else {
            return Ok(false);
        };

        self.blocking(move |client| {
            client.swap(&key, &current, memcache_protocol::EXPIRE_NOW, token)
        })
        .await
    }
}
