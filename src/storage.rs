//! Cache tiers shared by every component.
//!
//! Reads go to the durable store first (when one is configured) and then to
//! the process-local fallback. Hits are never copied from one tier into
//! another. Writes go to the durable store when one is configured, otherwise
//! to the fallback. Every failure is logged and swallowed: a broken cache
//! shows up as a miss, never as an error.

mod file;
mod memory;
mod redis_store;

pub use file::FileCache;
pub use memory::MemoryCache;
pub use redis_store::RedisCache;

use crate::config::Settings;
use crate::error::{LadderError, LadderResult};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// A key/value backend holding JSON text with a per-key time-to-live.
#[async_trait]
pub trait CacheStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns `None` for absent or expired keys.
    async fn get(&self, key: &str) -> LadderResult<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> LadderResult<()>;
}

pub struct CacheTiers {
    durable: Option<Box<dyn CacheStore>>,
    local: Box<dyn CacheStore>,
}

impl CacheTiers {
    pub fn new(durable: Option<Box<dyn CacheStore>>, local: Box<dyn CacheStore>) -> Self {
        Self { durable, local }
    }

    pub fn in_memory() -> Self {
        Self::new(None, Box::new(MemoryCache::new()))
    }

    /// Builds the tiers described by the settings. A durable store that cannot
    /// be reached at startup is left out, the process keeps running on the
    /// local tier alone.
    pub async fn from_settings(settings: &Settings) -> Self {
        let local: Box<dyn CacheStore> = match &settings.cache_dir {
            Some(dir) => {
                info!("Using file cache in {}", dir.display());
                Box::new(FileCache::new(dir.clone()))
            }
            None => Box::new(MemoryCache::new()),
        };

        let durable: Option<Box<dyn CacheStore>> = match &settings.redis_url {
            Some(url) => match RedisCache::connect(url, settings.connect_timeout()).await {
                Ok(redis) => {
                    info!("Connected to durable cache.");
                    Some(Box::new(redis))
                }
                Err(e) => {
                    warn!("Durable cache unreachable, falling back to local cache only. {e}");
                    None
                }
            },
            None => None,
        };

        Self::new(durable, local)
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                let error = LadderError::CacheUnavailable(format!("Undecodable entry {key}. {e}"));
                warn!("{error}");
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                let error = LadderError::CacheUnavailable(format!("Could not encode {key}. {e}"));
                warn!("{error}");
                return;
            }
        };

        let store = match &self.durable {
            Some(durable) => durable,
            None => &self.local,
        };
        match store.set(key, raw, ttl).await {
            Ok(()) => debug!("cache set {key} ({})", store.name()),
            Err(e) => warn!("{} write failed for {key}, dropped. {e}", store.name()),
        }
    }

    async fn get_raw(&self, key: &str) -> Option<String> {
        if let Some(durable) = &self.durable {
            match durable.get(key).await {
                Ok(Some(raw)) => {
                    debug!("cache hit {key} ({})", durable.name());
                    return Some(raw);
                }
                Ok(None) => {}
                Err(e) => warn!("{} read failed for {key}. {e}", durable.name()),
            }
        }

        match self.local.get(key).await {
            Ok(Some(raw)) => {
                debug!("cache hit {key} ({})", self.local.name());
                Some(raw)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("{} read failed for {key}. {e}", self.local.name());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct BrokenStore {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CacheStore for BrokenStore {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn get(&self, _key: &str) -> LadderResult<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(LadderError::CacheUnavailable("connection refused".to_string()))
        }

        async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> LadderResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(LadderError::CacheUnavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn round_trip_then_expiry() {
        let cache = CacheTiers::in_memory();
        cache.set("puuid:Tobio:CHL", &"abc-123".to_string(), Duration::from_millis(50)).await;

        let hit: Option<String> = cache.get("puuid:Tobio:CHL").await;
        assert_eq!(hit.as_deref(), Some("abc-123"));

        tokio::time::sleep(Duration::from_millis(80)).await;
        let expired: Option<String> = cache.get("puuid:Tobio:CHL").await;
        assert!(expired.is_none());
    }

    #[tokio::test]
    async fn broken_durable_store_degrades_to_miss() {
        let calls = Arc::new(AtomicUsize::new(0));
        let local = MemoryCache::new();
        let cache = CacheTiers::new(
            Some(Box::new(BrokenStore { calls: calls.clone() })),
            Box::new(local.clone()),
        );

        let miss: Option<u32> = cache.get("ranking").await;
        assert!(miss.is_none());

        cache.set("ranking", &42u32, Duration::from_secs(60)).await;
        let after_write: Option<u32> = cache.get("ranking").await;
        assert!(after_write.is_none());
        assert!(local.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn local_hits_are_still_read_behind_a_broken_durable_store() {
        let local = MemoryCache::new();
        local
            .set("puuid:Tobio:CHL", "\"abc-123\"".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        let cache = CacheTiers::new(
            Some(Box::new(BrokenStore {
                calls: Arc::new(AtomicUsize::new(0)),
            })),
            Box::new(local),
        );

        let hit: Option<String> = cache.get("puuid:Tobio:CHL").await;
        assert_eq!(hit.as_deref(), Some("abc-123"));
    }

    #[tokio::test]
    async fn undecodable_entry_is_a_miss() {
        let cache = CacheTiers::in_memory();
        cache.set("match:LA2_1", &"not a number", Duration::from_secs(60)).await;
        let value: Option<u64> = cache.get("match:LA2_1").await;
        assert!(value.is_none());
    }
}
