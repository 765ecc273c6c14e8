//! In-process [`KvCache`] backed by a `DashMap`.
//!
//! Only shared by tasks inside one process; deployments running several
//! processes plug a networked client in through the same trait. Expiry is
//! checked lazily on every access and swept periodically by
//! [`MemoryCache::spawn_cleanup_task`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{CacheError, KvCache};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Process-local TTL cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remaining TTL of a live key; `None` when absent or persistent.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entry = self.entries.get(key)?;
        if entry.is_expired(now) {
            return None;
        }
        entry.expires_at.map(|at| at - now)
    }

    /// Evict expired entries.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            debug!(evicted, "swept expired cache entries");
        }
    }

    /// Spawn a periodic sweep that runs until `shutdown` is cancelled.
    pub fn spawn_cleanup_task(
        self: &Arc<Self>,
        every: Duration,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => cache.cleanup(),
                }
            }
            debug!("cache sweep stopped");
        })
    }

    fn increment_now(&self, key: &str, now: Instant) -> Result<i64, CacheError> {
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: "0".to_string(),
            expires_at: None,
        });
        if entry.is_expired(now) {
            *entry = Entry {
                value: "0".to_string(),
                expires_at: None,
            };
        }
        let current: i64 = entry
            .value
            .parse()
            .map_err(|_| CacheError::WrongType(key.to_string()))?;
        let next = current + 1;
        entry.value = next.to_string();
        Ok(next)
    }

    fn set_if_absent_now(&self, key: &str, ttl_secs: u64, value: &str, now: Instant) -> bool {
        if ttl_secs == 0 {
            return false;
        }
        let fresh = Entry {
            value: value.to_string(),
            expires_at: Some(now + Duration::from_secs(ttl_secs)),
        };
        match self.entries.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                if !occupied.get().is_expired(now) {
                    return false;
                }
                occupied.insert(fresh);
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(fresh);
            }
        }
        true
    }

    fn expire_now(&self, key: &str, ttl_secs: u64, now: Instant) -> bool {
        let Some(mut entry) = self.entries.get_mut(key) else {
            return false;
        };
        if entry.is_expired(now) {
            drop(entry);
            self.entries.remove_if(key, |_, e| e.is_expired(now));
            return false;
        }
        entry.expires_at = Some(now + Duration::from_secs(ttl_secs));
        true
    }
}

#[async_trait]
impl KvCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let value = self
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone());
        Ok(value)
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        ttl_secs: u64,
        value: &str,
    ) -> Result<(), CacheError> {
        if ttl_secs == 0 {
            self.entries.remove(key);
            return Ok(());
        }
        let expires_at = Instant::now() + Duration::from_secs(ttl_secs);
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(expires_at),
            },
        );
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        ttl_secs: u64,
        value: &str,
    ) -> Result<bool, CacheError> {
        Ok(self.set_if_absent_now(key, ttl_secs, value, Instant::now()))
    }

    async fn increment(&self, key: &str) -> Result<i64, CacheError> {
        self.increment_now(key, Instant::now())
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, CacheError> {
        Ok(self.expire_now(key, ttl_secs, Instant::now()))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }
}
