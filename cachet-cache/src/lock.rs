//! Named advisory locks on top of a memory cache.
//!
//! A lock is the key `lock:<name>` holding the owner token of its holder.
//! Taking it is an `add`, giving it back a `compare_delete`, so only the
//! holder can release it and a crashed holder's lock expires with its TTL.
//!
//! ```
//! use cachet_cache::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), CacheError> {
//! let locks = CacheLock::new(Arc::new(ArrayCache::new()));
//!
//! assert!(locks.acquire("poller", Duration::ZERO, CacheLock::DEFAULT_TTL).await?);
//! assert!(locks.is_locked("poller").await?);
//! assert!(locks.release("poller").await?);
//! # Ok(())
//! # }
//! ```

use crate::error::CacheResult;
use crate::traits::MemoryCacheStore;
use crate::value::CacheValue;
use cachet_log::{debug, trace};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

/// Lock handle for one owner.
///
/// Every `CacheLock` gets its own owner token; locks taken through one
/// handle are re-entrant for that handle only.
pub struct CacheLock {
    store: Arc<dyn MemoryCacheStore>,
    owner: CacheValue,
    held: Mutex<BTreeSet<String>>,
}

impl CacheLock {
    /// Default lifetime of a taken lock.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

    /// Default time to wait for a contended lock.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    /// Shortest and longest pause between attempts, in milliseconds.
    const POLL_MIN_MS: u64 = 10;
    const POLL_MAX_MS: u64 = 100;

    /// Create a lock handle with a fresh owner token.
    pub fn new(store: Arc<dyn MemoryCacheStore>) -> Self {
        let owner = format!(
            "{}:{}",
            std::process::id(),
            NEXT_OWNER.fetch_add(1, Ordering::Relaxed)
        );

        Self {
            store,
            owner: CacheValue::String(owner),
            held: Mutex::new(BTreeSet::new()),
        }
    }

    /// The token stored in every lock this handle holds.
    pub fn owner(&self) -> &str {
        self.owner.as_str().unwrap_or_default()
    }

    /// Acquire `name`, waiting up to `timeout`.
    ///
    /// Returns `true` once the lock is held, also when this handle already
    /// held it (its TTL is then refreshed). Returns `false` if `timeout`
    /// passes first; a zero timeout means a single attempt.
    pub async fn acquire(&self, name: &str, timeout: Duration, ttl: Duration) -> CacheResult<bool> {
        let key = lock_key(name);
        // A timeout past the clock's range waits indefinitely
        let deadline = Instant::now().checked_add(timeout);

        loop {
            if self.try_acquire(&key, ttl).await? {
                self.held.lock().await.insert(name.to_string());
                debug!("Acquired lock '{}'", name);
                return Ok(true);
            }

            let now = Instant::now();
            let mut pause =
                Duration::from_millis(fastrand::u64(Self::POLL_MIN_MS..=Self::POLL_MAX_MS));
            if let Some(deadline) = deadline {
                if now >= deadline {
                    debug!("Timed out waiting for lock '{}'", name);
                    return Ok(false);
                }
                pause = pause.min(deadline - now);
            }

            tokio::time::sleep(pause).await;
        }
    }

    async fn try_acquire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        if self.store.add(key, &self.owner, Some(ttl)).await? {
            return Ok(true);
        }

        match self.store.get(key).await? {
            Some(current) if current == self.owner => {
                self.store
                    .compare_set(key, &self.owner, &self.owner, Some(ttl))
                    .await
            }
            Some(_) => {
                trace!("Lock {} held by another owner", key);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    /// Release `name` if this handle holds it.
    ///
    /// Returns `false` when the lock is held by someone else or not at all.
    pub async fn release(&self, name: &str) -> CacheResult<bool> {
        let released = self.store.compare_delete(&lock_key(name), &self.owner).await?;
        self.held.lock().await.remove(name);

        if released {
            debug!("Released lock '{}'", name);
        }
        Ok(released)
    }

    /// Release every lock this handle acquired.
    pub async fn release_all(&self) -> CacheResult<bool> {
        let names: Vec<String> = self.held.lock().await.iter().cloned().collect();

        let mut all = true;
        for name in names {
            all &= self.release(&name).await?;
        }
        Ok(all)
    }

    /// Whether anyone currently holds `name`.
    pub async fn is_locked(&self, name: &str) -> CacheResult<bool> {
        Ok(self.store.get(&lock_key(name)).await?.is_some())
    }
}

/// Cache key of the lock `name`.
pub fn lock_key(name: &str) -> String {
    format!("lock:{}", name)
}
