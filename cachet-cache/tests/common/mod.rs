//! Behaviour every driver must share, run against each driver by the
//! integration tests.

#![allow(dead_code)]

use cachet_cache::*;
use std::time::Duration;

/// Value shapes that must survive a round trip unchanged.
pub fn sample_values() -> Vec<(&'static str, CacheValue)> {
    vec![
        ("null", CacheValue::Null),
        ("true", CacheValue::Bool(true)),
        ("false", CacheValue::Bool(false)),
        ("zero", CacheValue::Int(0)),
        ("negative", CacheValue::Int(-42)),
        ("max", CacheValue::Int(i64::MAX)),
        ("float", CacheValue::Float(1.5)),
        ("float_small", CacheValue::Float(-0.000_125)),
        ("infinity", CacheValue::Float(f64::INFINITY)),
        ("empty", CacheValue::from("")),
        ("numeric_string", CacheValue::from("5")),
        ("unicode", CacheValue::from("grüße 🚀")),
        (
            "list",
            CacheValue::List(vec![
                CacheValue::Int(1),
                CacheValue::from("two"),
                CacheValue::List(vec![CacheValue::Null]),
            ]),
        ),
        ("object", CacheValue::Object(vec![0, 159, 146, 150, 255])),
    ]
}

/// Base contract: round trips, overwrite, delete, isolation, prefix
/// filtering, clear and keys with whitespace.
pub async fn check_base_contract(cache: &dyn CacheStore) {
    assert!(cache.clear(false).await.unwrap());

    for (key, value) in sample_values() {
        assert!(cache.set(key, &value, None).await.unwrap(), "set {}", key);
        assert_eq!(cache.get(key).await.unwrap(), Some(value), "get {}", key);
    }

    cache.set("nan", &CacheValue::Float(f64::NAN), None).await.unwrap();
    match cache.get("nan").await.unwrap() {
        Some(CacheValue::Float(f)) => assert!(f.is_nan()),
        other => panic!("expected NaN, got {:?}", other),
    }

    // Miss vs stored null
    assert_eq!(cache.get("never_set").await.unwrap(), None);
    assert_eq!(cache.get("null").await.unwrap(), Some(CacheValue::Null));

    // Overwrite
    assert!(cache.set("value1", &CacheValue::from("foobar"), None).await.unwrap());
    assert!(cache.set("value1", &CacheValue::from("ipsum"), None).await.unwrap());
    assert_eq!(cache.get("value1").await.unwrap(), Some(CacheValue::from("ipsum")));

    // Isolation
    assert!(cache.set("value2", &CacheValue::Int(2), None).await.unwrap());
    assert!(cache.delete("value2").await.unwrap());
    assert_eq!(cache.get("value1").await.unwrap(), Some(CacheValue::from("ipsum")));
    assert_eq!(cache.get("value2").await.unwrap(), None);

    // Deleting an absent key succeeds
    assert!(cache.delete("value2").await.unwrap());

    // Whitespace in keys
    assert!(cache.set("key space", &CacheValue::from("value"), None).await.unwrap());
    assert_eq!(cache.get("key space").await.unwrap(), Some(CacheValue::from("value")));

    check_prefix_filter(cache).await;
    check_unbounded_ttl(cache).await;
    check_clear(cache).await;
}

/// TTLs past what a backend can represent keep the entry instead of
/// expiring it on write.
async fn check_unbounded_ttl(cache: &dyn CacheStore) {
    for ttl in [Duration::MAX, Duration::from_secs(u64::MAX), ttl::YEAR * 200] {
        assert!(cache.set("huge_ttl", &CacheValue::Int(1), Some(ttl)).await.unwrap());
        assert_eq!(
            cache.get("huge_ttl").await.unwrap(),
            Some(CacheValue::Int(1)),
            "ttl {:?}",
            ttl
        );
    }
    assert!(cache.delete("huge_ttl").await.unwrap());
}

async fn check_prefix_filter(cache: &dyn CacheStore) {
    assert!(cache.clear(false).await.unwrap());

    cache.set("value1", &CacheValue::Int(1), None).await.unwrap();
    cache.set("value2", &CacheValue::Int(2), None).await.unwrap();
    cache.set("test_value3", &CacheValue::Int(3), None).await.unwrap();

    assert_eq!(
        cache.get_all_keys(Some("test")).await.unwrap(),
        vec!["test_value3"]
    );
    assert_eq!(
        cache.get_all_keys(None).await.unwrap(),
        vec!["test_value3", "value1", "value2"]
    );
    assert_eq!(cache.get_all_keys(Some("")).await.unwrap().len(), 3);
    assert!(cache.get_all_keys(Some("nothing")).await.unwrap().is_empty());
}

async fn check_clear(cache: &dyn CacheStore) {
    cache.set("a", &CacheValue::Int(1), None).await.unwrap();
    cache.set("b", &CacheValue::Int(2), Some(ttl::HOUR)).await.unwrap();

    assert!(cache.clear(true).await.unwrap());
    assert_eq!(cache.get("a").await.unwrap(), Some(CacheValue::Int(1)));
    assert_eq!(cache.get("b").await.unwrap(), Some(CacheValue::Int(2)));

    assert!(cache.clear(false).await.unwrap());
    assert_eq!(cache.get("a").await.unwrap(), None);
    assert_eq!(cache.get("b").await.unwrap(), None);
    assert!(cache.get_all_keys(None).await.unwrap().is_empty());
}

/// Memory contract: add, compare-set and compare-delete.
pub async fn check_memory_contract(cache: &dyn MemoryCacheStore) {
    assert!(cache.clear(false).await.unwrap());

    let a = CacheValue::from("a");
    let b = CacheValue::from("b");

    // add
    assert!(cache.add("k", &a, None).await.unwrap());
    assert!(!cache.add("k", &b, None).await.unwrap());
    assert_eq!(cache.get("k").await.unwrap(), Some(a.clone()));

    // compare_set
    assert!(!cache.compare_set("k", &b, &a, None).await.unwrap());
    assert_eq!(cache.get("k").await.unwrap(), Some(a.clone()));
    assert!(cache.compare_set("k", &a, &b, None).await.unwrap());
    assert_eq!(cache.get("k").await.unwrap(), Some(b.clone()));
    assert!(!cache.compare_set("absent", &a, &b, None).await.unwrap());
    assert_eq!(cache.get("absent").await.unwrap(), None);

    // compare_delete
    assert!(!cache.compare_delete("k", &a).await.unwrap());
    assert_eq!(cache.get("k").await.unwrap(), Some(b.clone()));
    assert!(cache.compare_delete("k", &b).await.unwrap());
    assert_eq!(cache.get("k").await.unwrap(), None);
    assert!(!cache.compare_delete("k", &b).await.unwrap());

    // Type fidelity in comparisons
    assert!(cache.add("typed", &CacheValue::Int(5), None).await.unwrap());
    assert!(!cache.compare_set("typed", &CacheValue::from("5"), &a, None).await.unwrap());
    assert!(cache.compare_set("typed", &CacheValue::Int(5), &CacheValue::Null, None).await.unwrap());
    assert!(cache.compare_delete("typed", &CacheValue::Null).await.unwrap());

    // Unbounded TTLs on the atomic paths
    assert!(cache.add("huge", &a, Some(Duration::MAX)).await.unwrap());
    assert!(cache.compare_set("huge", &a, &b, Some(Duration::MAX)).await.unwrap());
    assert_eq!(cache.get("huge").await.unwrap(), Some(b.clone()));

    assert!(cache.clear(false).await.unwrap());
}

/// Expiry: short TTLs vanish from reads and key listings, `clear(true)`
/// keeps live entries.
pub async fn check_expiry(cache: &dyn CacheStore) {
    assert!(cache.clear(false).await.unwrap());

    cache
        .set("short", &CacheValue::Int(1), Some(Duration::from_secs(1)))
        .await
        .unwrap();
    cache.set("long", &CacheValue::Int(2), Some(ttl::HOUR)).await.unwrap();
    cache.set("forever", &CacheValue::Int(3), None).await.unwrap();
    assert_eq!(cache.get("short").await.unwrap(), Some(CacheValue::Int(1)));

    tokio::time::sleep(Duration::from_millis(2100)).await;

    assert_eq!(cache.get("short").await.unwrap(), None);
    assert_eq!(cache.get_all_keys(None).await.unwrap(), vec!["forever", "long"]);

    assert!(cache.clear(true).await.unwrap());
    assert_eq!(cache.get("long").await.unwrap(), Some(CacheValue::Int(2)));
    assert_eq!(cache.get("forever").await.unwrap(), Some(CacheValue::Int(3)));

    assert!(cache.clear(false).await.unwrap());
}

/// Build `config`, or `None` when its backend is not reachable here.
pub async fn connect_or_skip(config: CacheConfig) -> Option<CacheClient> {
    match CacheFactory::new(config).create().await {
        Ok(client) => Some(client),
        Err(e) if e.is_unavailable() => {
            eprintln!("skipping: {}", e);
            None
        }
        Err(e) => panic!("unexpected error creating cache: {}", e),
    }
}
