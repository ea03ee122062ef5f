//! In-process lock records using moka
//!
//! Each id maps to the holder's token and expiry. Acquire and release go through
//! moka's per-key compute, which serializes concurrent callers on the same id.
//! Expiry is judged against the injected clock rather than moka's own TTL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use std::time::Duration;

use super::LockStore;
use crate::clock::{Clock, DynClock};
use crate::error::{AppError, AppResult};

/// Upper bound on distinct lock ids kept in memory
const MAX_LOCKS: u64 = 1_000;

#[derive(Debug, Clone)]
struct LockRecord {
    token: String,
    expires_at: DateTime<Utc>,
}

pub struct MemoryLockStore {
    entries: Cache<String, LockRecord>,
    clock: DynClock,
}

impl std::fmt::Debug for MemoryLockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLockStore")
            .field("entry_count", &self.entries.entry_count())
            .finish()
    }
}

impl MemoryLockStore {
    pub fn new(clock: DynClock) -> Self {
        Self {
            entries: Cache::builder().max_capacity(MAX_LOCKS).build(),
            clock,
        }
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn try_acquire(&self, id: &str, token: &str, ttl: Duration) -> AppResult<bool> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|_| AppError::validation(format!("lock ttl {:?} is out of range", ttl)))?;
        let now = self.clock.now();
        let record = LockRecord {
            token: token.to_string(),
            expires_at: now + ttl,
        };

        let result = self
            .entries
            .entry(id.to_string())
            .and_compute_with(move |current| {
                let op = match current {
                    Some(entry) if entry.value().expires_at > now => Op::Nop,
                    _ => Op::Put(record),
                };
                std::future::ready(op)
            })
            .await;

        Ok(matches!(
            result,
            CompResult::Inserted(_) | CompResult::ReplacedWith(_)
        ))
    }

    async fn release(&self, id: &str, token: &str) -> AppResult<bool> {
        let token = token.to_string();
        let result = self
            .entries
            .entry(id.to_string())
            .and_compute_with(move |current| {
                let op = match current {
                    Some(entry) if entry.value().token == token => Op::Remove,
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;

        Ok(matches!(result, CompResult::Removed(_)))
    }
}
