//! Lock records in the `locks` table
//!
//! Acquisition is two statements on the write pool: drop the record for the id
//! if it has expired, then insert-if-absent. The primary key on `locks.id`
//! decides between concurrent acquirers, so this works across processes that
//! share the database.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use super::LockStore;
use crate::clock::{Clock, DynClock};
use crate::db::{Conn, Storage};
use crate::error::{AppError, AppResult};

pub struct DatabaseLockStore {
    storage: Storage,
    clock: DynClock,
}

impl DatabaseLockStore {
    pub fn new(storage: Storage, clock: DynClock) -> Self {
        Self { storage, clock }
    }
}

const DELETE_EXPIRED: &str = "DELETE FROM locks WHERE id = ? AND expires_at <= ?";

const INSERT_SQLITE: &str = r#"
    INSERT OR IGNORE INTO locks (id, token, acquired_at, expires_at)
    VALUES (?, ?, ?, ?)
"#;

const INSERT_MYSQL: &str = r#"
    INSERT IGNORE INTO locks (id, token, acquired_at, expires_at)
    VALUES (?, ?, ?, ?)
"#;

const DELETE_HELD: &str = "DELETE FROM locks WHERE id = ? AND token = ?";

#[async_trait]
impl LockStore for DatabaseLockStore {
    async fn try_acquire(&self, id: &str, token: &str, ttl: Duration) -> AppResult<bool> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|_| AppError::validation(format!("lock ttl {:?} is out of range", ttl)))?;
        let now = self.clock.now();
        let expires_at = now + ttl;

        let db = self.storage.handle();
        let mut lease = db.writer().await?;
        let inserted = match lease.conn()? {
            Conn::Sqlite(c) => acquire_sqlite(c, id, token, now, expires_at).await?,
            Conn::Mysql(c) => acquire_mysql(c, id, token, now, expires_at).await?,
        };
        Ok(inserted == 1)
    }

    async fn release(&self, id: &str, token: &str) -> AppResult<bool> {
        let db = self.storage.handle();
        let mut lease = db.writer().await?;
        let deleted = match lease.conn()? {
            Conn::Sqlite(c) => sqlx::query(DELETE_HELD)
                .bind(id)
                .bind(token)
                .execute(c)
                .await
                .map(|r| r.rows_affected()),
            Conn::Mysql(c) => sqlx::query(DELETE_HELD)
                .bind(id)
                .bind(token)
                .execute(c)
                .await
                .map(|r| r.rows_affected()),
        }
        .with_context(|| format!("Failed to release lock {}", id))?;
        Ok(deleted == 1)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn acquire_sqlite(
    conn: &mut sqlx::SqliteConnection,
    id: &str,
    token: &str,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> anyhow::Result<u64> {
    sqlx::query(DELETE_EXPIRED)
        .bind(id)
        .bind(now)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("Failed to clear expired lock {}", id))?;

    let result = sqlx::query(INSERT_SQLITE)
        .bind(id)
        .bind(token)
        .bind(now)
        .bind(expires_at)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("Failed to insert lock {}", id))?;
    Ok(result.rows_affected())
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn acquire_mysql(
    conn: &mut sqlx::MySqlConnection,
    id: &str,
    token: &str,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> anyhow::Result<u64> {
    sqlx::query(DELETE_EXPIRED)
        .bind(id)
        .bind(now)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("Failed to clear expired lock {}", id))?;

    let result = sqlx::query(INSERT_MYSQL)
        .bind(id)
        .bind(token)
        .bind(now)
        .bind(expires_at)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("Failed to insert lock {}", id))?;
    Ok(result.rows_affected())
}
