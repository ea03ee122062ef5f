//! Lock records in Redis
//!
//! Acquire is `SET key token NX PX ttl`; Redis expires the key on its own.
//! Release runs a compare-and-delete script so a holder whose record expired
//! and was taken over cannot delete the new holder's key.

use anyhow::Context;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, Script};
use std::time::Duration;

use super::LockStore;
use crate::error::{AppError, AppResult};

const KEY_PREFIX: &str = "myblog:lock:";

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

pub struct RedisLockStore {
    connection: MultiplexedConnection,
    release: Script,
}

impl std::fmt::Debug for RedisLockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisLockStore").finish_non_exhaustive()
    }
}

impl RedisLockStore {
    pub async fn new(redis_url: &str) -> anyhow::Result<Self> {
        let client = Client::open(redis_url).context("Failed to create Redis client")?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to connect to Redis")?;

        Ok(Self {
            connection,
            release: Script::new(RELEASE_SCRIPT),
        })
    }

    fn key(id: &str) -> String {
        format!("{}{}", KEY_PREFIX, id)
    }
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn try_acquire(&self, id: &str, token: &str, ttl: Duration) -> AppResult<bool> {
        let millis = u64::try_from(ttl.as_millis())
            .ok()
            .filter(|ms| *ms > 0)
            .ok_or_else(|| AppError::validation(format!("lock ttl {:?} is out of range", ttl)))?;

        let mut conn = self.connection.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(Self::key(id))
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(millis)
            .query_async(&mut conn)
            .await
            .with_context(|| format!("Failed to acquire lock {} in Redis", id))?;

        Ok(reply.is_some())
    }

    async fn release(&self, id: &str, token: &str) -> AppResult<bool> {
        let mut conn = self.connection.clone();
        let deleted: i64 = self
            .release
            .key(Self::key(id))
            .arg(token)
            .invoke_async(&mut conn)
            .await
            .with_context(|| format!("Failed to release lock {} in Redis", id))?;

        Ok(deleted == 1)
    }
}
