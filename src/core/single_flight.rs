//! Single-flight regeneration of expensive cached artifacts.
//!
//! Only one caller at a time rebuilds a given key. Callers that arrive while a
//! rebuild is running wait for the lock up to `max_wait`, then re-check the
//! cache and usually find the fresh value there. A caller that cannot get the
//! lock in time serves the last known value, fresh or stale, and only fails
//! with [`LadderError::RebuildBusy`] when there is nothing to serve.

use crate::error::{LadderError, LadderResult};
use crate::storage::CacheTiers;
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildPolicy {
    /// Lifetime of the value under its own key.
    pub fresh_ttl: Duration,
    /// Lifetime of the copy kept for callers that time out on the lock.
    pub stale_ttl: Duration,
    pub max_wait: Duration,
}

#[derive(Default)]
pub struct RebuildLock {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RebuildLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stale_key(key: &str) -> String {
        format!("{key}:stale")
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks.entry(key.to_string()).or_default().clone()
    }

    pub async fn with_exclusive_rebuild<T, F, Fut>(
        &self,
        cache: &CacheTiers,
        key: &str,
        policy: &RebuildPolicy,
        rebuild: F,
    ) -> LadderResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = LadderResult<T>>,
    {
        if let Some(value) = cache.get::<T>(key).await {
            return Ok(value);
        }

        let lock = self.lock_for(key);
        // Released on drop, whether the rebuild succeeds, fails or panics.
        let _guard = match tokio::time::timeout(policy.max_wait, lock.lock_owned()).await {
            Ok(guard) => guard,
            Err(_) => {
                warn!("Waited {:?} for rebuild of {key}, serving last known value.", policy.max_wait);
                return self.last_known(cache, key).await.ok_or(LadderError::RebuildBusy);
            }
        };

        if let Some(value) = cache.get::<T>(key).await {
            debug!("{key} rebuilt by another caller");
            return Ok(value);
        }

        info!("Rebuilding {key}.");
        match rebuild().await {
            Ok(value) => {
                cache.set(key, &value, policy.fresh_ttl).await;
                cache.set(&Self::stale_key(key), &value, policy.stale_ttl).await;
                info!("Rebuilt {key}.");
                Ok(value)
            }
            Err(e) => {
                error!("Could not rebuild {key}. {e}");
                match self.last_known(cache, key).await {
                    Some(value) => Ok(value),
                    None => Err(e),
                }
            }
        }
    }

    async fn last_known<T: DeserializeOwned>(&self, cache: &CacheTiers, key: &str) -> Option<T> {
        match cache.get::<T>(key).await {
            Some(value) => Some(value),
            None => cache.get::<T>(&Self::stale_key(key)).await,
        }
    }
}
