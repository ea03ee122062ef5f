//! Exclusive lock
//!
//! A named, TTL-bound mutual-exclusion primitive. The ranking batch holds one
//! for its whole run so that two runs never overlap.
//!
//! Lock records live in a [`LockStore`]:
//! - `DatabaseLockStore` - `locks` table, works across processes (default)
//! - `MemoryLockStore` - moka, one process only
//! - `RedisLockStore` - `SET NX PX`, behind the `redis-cache` feature
//!
//! # Usage
//!
//! ```rust,ignore
//! let lock = ExclusiveLock::new(store);
//! let guard = lock.lock("calculate-popular-ranking", Duration::from_secs(600)).await?;
//! run_batch().await?;
//! guard.release().await?;
//! ```

pub mod database;
pub mod memory;
#[cfg(feature = "redis-cache")]
pub mod redis;

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::clock::DynClock;
use crate::config::{LockConfig, LockDriver};
use crate::db::Storage;
use crate::error::{AppError, AppResult};

pub use database::DatabaseLockStore;
pub use memory::MemoryLockStore;
#[cfg(feature = "redis-cache")]
pub use redis::RedisLockStore;

/// Storage for lock records.
///
/// Both operations must be atomic with respect to other callers of the same
/// store, including callers in other processes where the backend allows it.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Register `token` as holder of `id` for `ttl` unless a live record exists.
    /// An expired record is replaced. Returns whether the lock was acquired.
    async fn try_acquire(&self, id: &str, token: &str, ttl: Duration) -> AppResult<bool>;

    /// Remove the record for `id` if `token` still holds it
    async fn release(&self, id: &str, token: &str) -> AppResult<bool>;
}

pub type DynLockStore = Arc<dyn LockStore>;

/// Build the lock store selected by configuration
pub async fn create_lock_store(
    config: &LockConfig,
    storage: &Storage,
    clock: DynClock,
) -> anyhow::Result<DynLockStore> {
    match config.driver {
        LockDriver::Database => {
            tracing::debug!("Using database lock store");
            Ok(Arc::new(DatabaseLockStore::new(storage.clone(), clock)))
        }
        LockDriver::Memory => {
            tracing::debug!("Using in-memory lock store");
            Ok(Arc::new(MemoryLockStore::new(clock)))
        }
        #[cfg(feature = "redis-cache")]
        LockDriver::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("lock.redis_url is required for the redis lock driver"))?;
            tracing::debug!("Using Redis lock store");
            Ok(Arc::new(RedisLockStore::new(url).await?))
        }
        #[cfg(not(feature = "redis-cache"))]
        LockDriver::Redis => {
            anyhow::bail!("the redis lock driver requires the `redis-cache` feature")
        }
    }
}

/// Acquires named locks from a [`LockStore`]
#[derive(Clone)]
pub struct ExclusiveLock {
    store: DynLockStore,
}

impl ExclusiveLock {
    pub fn new(store: DynLockStore) -> Self {
        Self { store }
    }

    /// Take the lock `id` for at most `ttl`.
    ///
    /// Fails with [`AppError::AlreadyLocked`] while another holder's record is live.
    pub async fn lock(&self, id: &str, ttl: Duration) -> AppResult<LockGuard> {
        let token = Uuid::new_v4().to_string();

        if !self.store.try_acquire(id, &token, ttl).await? {
            tracing::info!("Lock '{}' is held by another run", id);
            return Err(AppError::AlreadyLocked(id.to_string()));
        }

        tracing::debug!("Acquired lock '{}' for {:?}", id, ttl);
        Ok(LockGuard {
            store: self.store.clone(),
            id: id.to_string(),
            token,
            released: false,
        })
    }

    /// Run `work` while holding `id`; the lock is released on every exit path
    pub async fn with_lock<T, Fut>(&self, id: &str, ttl: Duration, work: Fut) -> AppResult<T>
    where
        Fut: Future<Output = AppResult<T>>,
    {
        let guard = self.lock(id, ttl).await?;
        let result = work.await;
        if let Err(e) = guard.release().await {
            // The record still expires after its TTL
            tracing::warn!("Failed to release lock '{}': {}", id, e);
        }
        result
    }
}

/// Holder of an acquired lock.
///
/// Call [`release`](Self::release) when done. A guard dropped without being
/// released schedules the release on the current Tokio runtime.
pub struct LockGuard {
    store: DynLockStore,
    id: String,
    token: String,
    released: bool,
}

impl LockGuard {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn release(mut self) -> AppResult<()> {
        self.released = true;
        if self.store.release(&self.id, &self.token).await? {
            tracing::debug!("Released lock '{}'", self.id);
        } else {
            tracing::warn!("Lock '{}' had already expired or been taken over", self.id);
        }
        Ok(())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let store = self.store.clone();
        let id = std::mem::take(&mut self.id);
        let token = std::mem::take(&mut self.token);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = store.release(&id, &token).await {
                        tracing::warn!("Failed to release dropped lock '{}': {}", id, e);
                    }
                });
            }
            Err(_) => {
                tracing::warn!("Lock '{}' dropped outside a runtime; it will expire after its TTL", id);
            }
        }
    }
}
