//! Fast tier: string values by key with absolute and sliding expiry.

use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{sync::RwLock, time::Instant};

/// Errors raised by a cache backend
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// Expiry policy applied to every cache write
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachePolicy {
    /// Hard lifetime from the moment of the write
    pub absolute: Duration,
    /// Entry is dropped if not read or written for this long
    pub sliding: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            absolute: Duration::from_secs(60 * 60),
            sliding: Duration::from_secs(10 * 60),
        }
    }
}

#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, policy: CachePolicy) -> Result<(), CacheError>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
    sliding: Duration,
    last_access: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at && now.duration_since(self.last_access) < self.sliding
    }
}

/// In-process cache shared by every connection
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry (call periodically)
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SessionCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        match entries.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                entry.last_access = now;
                Ok(Some(entry.value.clone()))
            }
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, policy: CachePolicy) -> Result<(), CacheError> {
        let now = Instant::now();
        let entry = CacheEntry {
            value,
            expires_at: now + policy.absolute,
            sliding: policy.sliding,
            last_access: now,
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }
}

/// Spawn a background task that sweeps expired cache entries
pub fn spawn_cache_sweeper(cache: MemoryCache, interval: Duration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let removed = cache.purge_expired().await;
            if removed > 0 {
                tracing::debug!("Swept {} expired session cache entries", removed);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_policy() -> CachePolicy {
        CachePolicy {
            absolute: Duration::from_millis(200),
            sliding: Duration::from_millis(60),
        }
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = MemoryCache::new();
        cache
            .set("k", "v".to_string(), CachePolicy::default())
            .await
            .unwrap();

        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(cache.get("missing").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sliding_expiry_drops_idle_entry() {
        let cache = MemoryCache::new();
        cache.set("k", "v".to_string(), short_policy()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_refresh_sliding_window() {
        let cache = MemoryCache::new();
        let policy = CachePolicy {
            absolute: Duration::from_secs(5),
            sliding: Duration::from_millis(150),
        };
        cache.set("k", "v".to_string(), policy).await.unwrap();

        // Idle time adds up past the window, but each read restarts it
        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            assert!(cache.get("k").await.unwrap().is_some());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_absolute_expiry_wins_over_reads() {
        let cache = MemoryCache::new();
        let policy = CachePolicy {
            absolute: Duration::from_millis(120),
            sliding: Duration::from_secs(5),
        };
        cache.set("k", "v".to_string(), policy).await.unwrap();

        assert!(cache.get("k").await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(160)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = MemoryCache::new();
        cache.set("old", "v".to_string(), short_policy()).await.unwrap();
        cache
            .set("fresh", "v".to_string(), CachePolicy::default())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(cache.purge_expired().await, 1);
        assert_eq!(cache.len().await, 1);
    }
}
