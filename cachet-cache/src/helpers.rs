//! Typed helpers over any cache store.
//!
//! Arbitrary `Serialize` types travel as [`CacheValue::Object`], so they
//! round-trip through every driver.

use crate::error::CacheResult;
use crate::traits::CacheStore;
use crate::value::CacheValue;
use serde::{Serialize, de::DeserializeOwned};
use std::future::Future;
use std::time::Duration;

/// Get a typed value from the cache.
///
/// Returns `Ok(None)` on a miss or when the stored value is not an object.
pub async fn get_object<S, T>(store: &S, key: &str) -> CacheResult<Option<T>>
where
    S: CacheStore + ?Sized,
    T: DeserializeOwned,
{
    match store.get(key).await? {
        Some(value) => value.to_object(),
        None => Ok(None),
    }
}

/// Set a typed value in the cache.
pub async fn set_object<S, T>(
    store: &S,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> CacheResult<bool>
where
    S: CacheStore + ?Sized,
    T: Serialize + ?Sized,
{
    let value = CacheValue::object(value)?;
    store.set(key, &value, ttl).await
}

/// Remember a value for a given duration.
///
/// If the key exists, returns the cached value.
/// If not, calls the factory function, caches the result, and returns it.
pub async fn remember<S, T, F, Fut>(
    store: &S,
    key: &str,
    ttl: Duration,
    factory: F,
) -> CacheResult<T>
where
    S: CacheStore + ?Sized,
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = CacheResult<T>>,
{
    if let Some(value) = get_object(store, key).await? {
        return Ok(value);
    }

    let value = factory().await?;
    set_object(store, key, &value, Some(ttl)).await?;
    Ok(value)
}

/// Remember a value forever (no TTL).
pub async fn remember_forever<S, T, F, Fut>(store: &S, key: &str, factory: F) -> CacheResult<T>
where
    S: CacheStore + ?Sized,
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = CacheResult<T>>,
{
    if let Some(value) = get_object(store, key).await? {
        return Ok(value);
    }

    let value = factory().await?;
    set_object(store, key, &value, None).await?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array_cache::ArrayCache;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct User {
        id: u64,
        name: String,
    }

    #[tokio::test]
    async fn test_object_round_trip() {
        let cache = ArrayCache::new();
        let user = User {
            id: 7,
            name: "Alice".to_string(),
        };

        assert!(set_object(&cache, "user:7", &user, None).await.unwrap());
        let cached: Option<User> = get_object(&cache, "user:7").await.unwrap();
        assert_eq!(cached, Some(user));

        let missing: Option<User> = get_object(&cache, "user:8").await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_non_object_reads_as_none() {
        let cache = ArrayCache::new();
        cache.set("plain", &CacheValue::Int(3), None).await.unwrap();

        let value: Option<User> = get_object(&cache, "plain").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_remember_calls_factory_once() {
        let cache = ArrayCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Vec<u32> = remember(&cache, "numbers", crate::ttl::MINUTE, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec![1, 2, 3])
            })
            .await
            .unwrap();
            assert_eq!(value, vec![1, 2, 3]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remember_forever_propagates_factory_error() {
        let cache = ArrayCache::new();
        let result: CacheResult<String> = remember_forever(&cache, "k", || async {
            Err(crate::error::CacheError::Other("boom".into()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(cache.get("k").await.unwrap(), None);
    }
}
