//! Process-wide shared-memory cache.
//!
//! Every `ApcuCache` in the process attaches to one shared segment, the way
//! APCu shares its store between PHP workers of one server. Instances are
//! isolated from each other only by their namespace.

use crate::error::CacheResult;
use crate::namespace::Namespace;
use crate::traits::{CacheStore, MemoryCacheStore};
use crate::value::CacheValue;
use async_trait::async_trait;
use cachet_log::trace;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct SharedEntry {
    value: CacheValue,
    expires_at: Option<Instant>,
}

impl SharedEntry {
    fn new(value: &CacheValue, ttl: Option<Duration>) -> Self {
        Self {
            value: value.clone(),
            // Past the clock's range the entry never expires
            expires_at: crate::ttl::effective(ttl)
                .and_then(|ttl| Instant::now().checked_add(ttl)),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

type Segment = Arc<DashMap<String, SharedEntry>>;

static SEGMENT: Lazy<Segment> = Lazy::new(|| Arc::new(DashMap::new()));

/// Shared-memory cache driver.
///
/// Atomicity comes from the segment's shard locks: `add`, `compare_set` and
/// `compare_delete` each run under the lock of the shard that owns the key.
#[derive(Clone)]
pub struct ApcuCache {
    segment: Segment,
    namespace: Namespace,
}

impl ApcuCache {
    /// Driver name.
    pub const NAME: &'static str = "apcu";

    /// Attach to the process-wide segment under `namespace`.
    pub fn new(namespace: Namespace) -> Self {
        Self {
            segment: SEGMENT.clone(),
            namespace,
        }
    }

    /// Whether the shared store is compiled in.
    pub fn is_available() -> bool {
        cfg!(feature = "apcu")
    }

    /// The namespace this instance writes under.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }
}

#[async_trait]
impl CacheStore for ApcuCache {
    async fn get(&self, key: &str) -> CacheResult<Option<CacheValue>> {
        let full = self.namespace.key(key);
        let now = Instant::now();
        Ok(self
            .segment
            .get(&full)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &CacheValue, ttl: Option<Duration>) -> CacheResult<bool> {
        self.segment
            .insert(self.namespace.key(key), SharedEntry::new(value, ttl));
        Ok(true)
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.segment.remove(&self.namespace.key(key));
        Ok(true)
    }

    async fn clear(&self, outdated_only: bool) -> CacheResult<bool> {
        let now = Instant::now();
        let prefix = self.namespace.prefix();
        self.segment.retain(|key, entry| {
            !key.starts_with(prefix) || (outdated_only && entry.is_live(now))
        });
        Ok(true)
    }

    async fn get_all_keys(&self, prefix: Option<&str>) -> CacheResult<Vec<String>> {
        let now = Instant::now();
        let live: Vec<String> = self
            .segment
            .iter()
            .filter(|item| item.value().is_live(now))
            .map(|item| item.key().clone())
            .collect();
        Ok(self.namespace.filter_keys(live, prefix))
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}

#[async_trait]
impl MemoryCacheStore for ApcuCache {
    async fn add(&self, key: &str, value: &CacheValue, ttl: Option<Duration>) -> CacheResult<bool> {
        let now = Instant::now();
        match self.segment.entry(self.namespace.key(key)) {
            Entry::Occupied(entry) if entry.get().is_live(now) => Ok(false),
            Entry::Occupied(mut entry) => {
                entry.insert(SharedEntry::new(value, ttl));
                Ok(true)
            }
            Entry::Vacant(entry) => {
                entry.insert(SharedEntry::new(value, ttl));
                Ok(true)
            }
        }
    }

    async fn compare_set(
        &self,
        key: &str,
        old: &CacheValue,
        new: &CacheValue,
        ttl: Option<Duration>,
    ) -> CacheResult<bool> {
        let now = Instant::now();
        let Some(mut entry) = self.segment.get_mut(&self.namespace.key(key)) else {
            return Ok(false);
        };

        if !entry.is_live(now) || entry.value != *old {
            trace!("compare_set mismatch for {}", key);
            return Ok(false);
        }

        *entry = SharedEntry::new(new, ttl);
        Ok(true)
    }

    async fn compare_delete(&self, key: &str, value: &CacheValue) -> CacheResult<bool> {
        let now = Instant::now();
        let removed = self
            .segment
            .remove_if(&self.namespace.key(key), |_, entry| {
                entry.is_live(now) && entry.value == *value
            });
        Ok(removed.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(name: &str) -> ApcuCache {
        ApcuCache::new(Namespace::new(format!("apcu-unit-{}", name)))
    }

    #[tokio::test]
    async fn test_instances_share_the_segment() {
        let first = cache("shared");
        let second = cache("shared");

        first.set("k", &CacheValue::Int(7), None).await.unwrap();
        assert_eq!(second.get("k").await.unwrap(), Some(CacheValue::Int(7)));
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let a = cache("iso-a");
        let b = cache("iso-b");

        a.set("k", &CacheValue::Bool(true), None).await.unwrap();
        assert_eq!(b.get("k").await.unwrap(), None);

        b.clear(false).await.unwrap();
        assert_eq!(a.get("k").await.unwrap(), Some(CacheValue::Bool(true)));
    }

    #[tokio::test]
    async fn test_expiry() {
        let cache = cache("expiry");
        cache
            .set("short", &CacheValue::from("x"), Some(Duration::from_millis(20)))
            .await
            .unwrap();
        cache.set("long", &CacheValue::from("y"), None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(cache.get("short").await.unwrap(), None);
        assert_eq!(cache.get_all_keys(None).await.unwrap(), vec!["long"]);

        assert!(cache.clear(true).await.unwrap());
        assert_eq!(cache.get("long").await.unwrap(), Some(CacheValue::from("y")));
    }

    #[tokio::test]
    async fn test_add_replaces_expired_entry() {
        let cache = cache("add-expired");
        cache
            .set("k", &CacheValue::Int(1), Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(cache.add("k", &CacheValue::Int(2), None).await.unwrap());
        assert_eq!(cache.get("k").await.unwrap(), Some(CacheValue::Int(2)));
    }

    #[tokio::test]
    async fn test_concurrent_add_has_one_winner() {
        let cache = cache("race");
        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.add("slot", &CacheValue::Int(i), None).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
