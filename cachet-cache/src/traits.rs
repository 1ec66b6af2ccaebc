//! Cache capability traits.

use crate::error::CacheResult;
use crate::value::CacheValue;
use async_trait::async_trait;
use std::time::Duration;

/// Base capability every cache driver provides.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a value from the cache.
    ///
    /// # Returns
    ///
    /// Returns `Ok(Some(value))` for a live entry, `Ok(None)` on a miss
    /// (absent or expired key). A stored null comes back as
    /// `Ok(Some(CacheValue::Null))`.
    async fn get(&self, key: &str) -> CacheResult<Option<CacheValue>>;

    /// Store a value, overwriting any existing entry and its expiry.
    ///
    /// # Arguments
    ///
    /// * `key` - The cache key
    /// * `value` - The value to store
    /// * `ttl` - Time-to-live; `None` or zero means no expiry
    async fn set(&self, key: &str, value: &CacheValue, ttl: Option<Duration>)
    -> CacheResult<bool>;

    /// Delete a key.
    ///
    /// Returns `true` whether or not the key existed.
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    /// Clear entries in this cache's namespace.
    ///
    /// With `outdated_only` set only expired entries are removed; otherwise
    /// every entry of the namespace is.
    async fn clear(&self, outdated_only: bool) -> CacheResult<bool>;

    /// List live keys that start with `prefix` (all keys for `None` or `""`),
    /// sorted.
    async fn get_all_keys(&self, prefix: Option<&str>) -> CacheResult<Vec<String>>;

    /// Constant driver identifier.
    fn name(&self) -> &'static str;

    /// Get multiple keys in parallel.
    ///
    /// Returns one entry per key, in input order, `None` for misses.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use cachet_cache::*;
    /// # async fn example(cache: &impl CacheStore) -> CacheResult<()> {
    /// let values = cache.get_many(&["user:1", "user:2"]).await?;
    /// assert_eq!(values.len(), 2);
    /// # Ok(())
    /// # }
    /// ```
    async fn get_many(&self, keys: &[&str]) -> CacheResult<Vec<Option<CacheValue>>> {
        use futures::future::try_join_all;

        let futures = keys.iter().map(|key| self.get(key));
        try_join_all(futures).await
    }

    /// Set multiple key-value pairs in parallel.
    async fn set_many(
        &self,
        items: &[(&str, CacheValue)],
        ttl: Option<Duration>,
    ) -> CacheResult<bool> {
        use futures::future::try_join_all;

        let futures = items.iter().map(|(key, value)| self.set(key, value, ttl));
        let results = try_join_all(futures).await?;
        Ok(results.into_iter().all(|stored| stored))
    }

    /// Delete multiple keys in parallel.
    async fn delete_many(&self, keys: &[&str]) -> CacheResult<bool> {
        use futures::future::try_join_all;

        let futures = keys.iter().map(|key| self.delete(key));
        try_join_all(futures).await?;
        Ok(true)
    }
}

/// Read-modify-write capability for backends with real atomic primitives.
///
/// A `false` return means the precondition did not hold (key present for
/// `add`, value mismatch for the compare operations). It is never retried
/// internally.
#[async_trait]
pub trait MemoryCacheStore: CacheStore {
    /// Store `value` only if `key` is absent or expired.
    async fn add(&self, key: &str, value: &CacheValue, ttl: Option<Duration>)
    -> CacheResult<bool>;

    /// Replace the value with `new` only if the current value equals `old`.
    async fn compare_set(
        &self,
        key: &str,
        old: &CacheValue,
        new: &CacheValue,
        ttl: Option<Duration>,
    ) -> CacheResult<bool>;

    /// Delete the entry only if its current value equals `value`.
    async fn compare_delete(&self, key: &str, value: &CacheValue) -> CacheResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    struct MockStore {
        data: Mutex<HashMap<String, CacheValue>>,
    }

    #[async_trait]
    impl CacheStore for MockStore {
        async fn get(&self, key: &str) -> CacheResult<Option<CacheValue>> {
            Ok(self.data.lock().await.get(key).cloned())
        }

        async fn set(
            &self,
            key: &str,
            value: &CacheValue,
            _ttl: Option<Duration>,
        ) -> CacheResult<bool> {
            self.data.lock().await.insert(key.to_string(), value.clone());
            Ok(true)
        }

        async fn delete(&self, key: &str) -> CacheResult<bool> {
            self.data.lock().await.remove(key);
            Ok(true)
        }

        async fn clear(&self, _outdated_only: bool) -> CacheResult<bool> {
            Ok(true)
        }

        async fn get_all_keys(&self, prefix: Option<&str>) -> CacheResult<Vec<String>> {
            let data = self.data.lock().await;
            Ok(crate::namespace::filter_by_prefix(data.keys(), prefix))
        }

        fn name(&self) -> &'static str {
            "mock"
        }
    }

    #[tokio::test]
    async fn test_batch_defaults() {
        let store = MockStore {
            data: Mutex::new(HashMap::new()),
        };

        let items = vec![("a", CacheValue::Int(1)), ("b", CacheValue::Null)];
        assert!(store.set_many(&items, None).await.unwrap());

        let values = store.get_many(&["a", "b", "c"]).await.unwrap();
        assert_eq!(
            values,
            vec![Some(CacheValue::Int(1)), Some(CacheValue::Null), None]
        );

        assert!(store.delete_many(&["a", "c"]).await.unwrap());
        assert_eq!(store.get_all_keys(None).await.unwrap(), vec!["b"]);
    }
}
