//! In-process array cache.

use crate::error::CacheResult;
use crate::namespace::filter_by_prefix;
use crate::traits::{CacheStore, MemoryCacheStore};
use crate::value::CacheValue;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Reference driver backed by a plain map.
///
/// Entries live as long as the instance. TTLs are accepted and ignored, so
/// nothing ever becomes outdated. Compare operations are check-then-act
/// under the write lock.
#[derive(Clone, Default)]
pub struct ArrayCache {
    data: Arc<RwLock<HashMap<String, CacheValue>>>,
}

impl ArrayCache {
    /// Driver name.
    pub const NAME: &'static str = "array";

    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Always available.
    pub fn is_available() -> bool {
        true
    }

    /// Number of entries.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for ArrayCache {
    async fn get(&self, key: &str) -> CacheResult<Option<CacheValue>> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn set(
        &self,
        key: &str,
        value: &CacheValue,
        _ttl: Option<Duration>,
    ) -> CacheResult<bool> {
        self.data
            .write()
            .await
            .insert(key.to_string(), value.clone());
        Ok(true)
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.data.write().await.remove(key);
        Ok(true)
    }

    async fn clear(&self, outdated_only: bool) -> CacheResult<bool> {
        // No TTL, so nothing is ever outdated
        if !outdated_only {
            self.data.write().await.clear();
        }
        Ok(true)
    }

    async fn get_all_keys(&self, prefix: Option<&str>) -> CacheResult<Vec<String>> {
        let data = self.data.read().await;
        Ok(filter_by_prefix(data.keys(), prefix))
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}

#[async_trait]
impl MemoryCacheStore for ArrayCache {
    async fn add(
        &self,
        key: &str,
        value: &CacheValue,
        _ttl: Option<Duration>,
    ) -> CacheResult<bool> {
        let mut data = self.data.write().await;
        if data.contains_key(key) {
            return Ok(false);
        }
        data.insert(key.to_string(), value.clone());
        Ok(true)
    }

    async fn compare_set(
        &self,
        key: &str,
        old: &CacheValue,
        new: &CacheValue,
        _ttl: Option<Duration>,
    ) -> CacheResult<bool> {
        let mut data = self.data.write().await;
        match data.get_mut(key) {
            Some(current) if current == old => {
                *current = new.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn compare_delete(&self, key: &str, value: &CacheValue) -> CacheResult<bool> {
        let mut data = self.data.write().await;
        if data.get(key) == Some(value) {
            data.remove(key);
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = ArrayCache::new();

        assert!(cache.set("value1", &"foobar".into(), None).await.unwrap());
        assert_eq!(cache.get("value1").await.unwrap(), Some(CacheValue::from("foobar")));

        assert!(cache.set("value1", &"ipsum".into(), None).await.unwrap());
        assert_eq!(cache.get("value1").await.unwrap(), Some(CacheValue::from("ipsum")));

        assert!(cache.delete("value1").await.unwrap());
        assert_eq!(cache.get("value1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_absent_key_succeeds() {
        let cache = ArrayCache::new();
        assert!(cache.delete("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_ttl_is_ignored() {
        let cache = ArrayCache::new();
        cache
            .set("k", &CacheValue::Int(1), Some(Duration::from_nanos(1)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(cache.get("k").await.unwrap(), Some(CacheValue::Int(1)));
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = ArrayCache::new();
        cache.set("a", &CacheValue::Null, None).await.unwrap();

        assert!(cache.clear(true).await.unwrap());
        assert_eq!(cache.len().await, 1);

        assert!(cache.clear(false).await.unwrap());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_compare_operations() {
        let cache = ArrayCache::new();
        let a = CacheValue::from("a");
        let b = CacheValue::from("b");

        assert!(!cache.compare_set("k", &a, &b, None).await.unwrap());
        assert!(cache.add("k", &a, None).await.unwrap());
        assert!(!cache.add("k", &b, None).await.unwrap());
        assert!(cache.compare_set("k", &a, &b, None).await.unwrap());
        assert!(!cache.compare_delete("k", &a).await.unwrap());
        assert!(cache.compare_delete("k", &b).await.unwrap());
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[test]
    fn test_name() {
        assert_eq!(ArrayCache::new().name(), "array");
        assert!(ArrayCache::is_available());
    }
}
