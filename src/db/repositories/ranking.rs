//! Ranking repository
//!
//! The `rankings` table holds exactly one generation. [`RankingRepository::save_rankings`]
//! replaces it with a delete followed by one insert per entry; it never opens a
//! transaction of its own, so callers run it through the unit of work to make the
//! replacement atomic.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::clock::{Clock, DynClock, SystemClock};
use crate::db::{Conn, DbHandle};
use crate::error::AppResult;
use crate::models::Ranking;

/// Ranking repository trait
#[async_trait]
pub trait RankingRepository: Send + Sync {
    /// Replace the stored generation with `rankings`, stamping fresh timestamps
    async fn save_rankings(&self, db: &DbHandle, rankings: &[Ranking]) -> AppResult<()>;

    /// The current generation ordered by position, at most `limit` rows.
    ///
    /// Deleting a ranked blog cascades to its row, so positions can skip a
    /// number until the next generation is saved. Order is unaffected.
    async fn get_rankings(&self, db: &DbHandle, limit: i64) -> AppResult<Vec<Ranking>>;
}

pub struct SqlxRankingRepository {
    clock: DynClock,
}

impl SqlxRankingRepository {
    pub fn new(clock: DynClock) -> Self {
        Self { clock }
    }

    pub fn boxed(clock: DynClock) -> Arc<dyn RankingRepository> {
        Arc::new(Self::new(clock))
    }
}

impl Default for SqlxRankingRepository {
    fn default() -> Self {
        Self::new(SystemClock::shared())
    }
}

const INSERT_RANKING: &str = r#"
    INSERT INTO rankings (blog_id, ranking_position, score, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?)
"#;

const SELECT_RANKINGS: &str = r#"
    SELECT blog_id, ranking_position, score, created_at, updated_at
    FROM rankings
    ORDER BY ranking_position ASC
    LIMIT ?
"#;

#[async_trait]
impl RankingRepository for SqlxRankingRepository {
    async fn save_rankings(&self, db: &DbHandle, rankings: &[Ranking]) -> AppResult<()> {
        let now = self.clock.now();
        let mut lease = db.writer().await?;
        match lease.conn()? {
            Conn::Sqlite(c) => save_rankings_sqlite(c, rankings, now).await?,
            Conn::Mysql(c) => save_rankings_mysql(c, rankings, now).await?,
        }
        tracing::debug!("Saved {} ranking entries", rankings.len());
        Ok(())
    }

    async fn get_rankings(&self, db: &DbHandle, limit: i64) -> AppResult<Vec<Ranking>> {
        let mut lease = db.reader().await?;
        let rankings = match lease.conn()? {
            Conn::Sqlite(c) => {
                sqlx::query_as::<_, Ranking>(SELECT_RANKINGS)
                    .bind(limit)
                    .fetch_all(c)
                    .await
            }
            Conn::Mysql(c) => {
                sqlx::query_as::<_, Ranking>(SELECT_RANKINGS)
                    .bind(limit)
                    .fetch_all(c)
                    .await
            }
        }
        .context("Failed to load rankings")?;
        Ok(rankings)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn save_rankings_sqlite(
    conn: &mut sqlx::SqliteConnection,
    rankings: &[Ranking],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM rankings")
        .execute(&mut *conn)
        .await
        .context("Failed to clear rankings")?;

    for rank in rankings {
        sqlx::query(INSERT_RANKING)
            .bind(&rank.blog_id)
            .bind(rank.position)
            .bind(rank.score)
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await
            .with_context(|| {
                format!("Failed to insert ranking {} for blog {}", rank.position, rank.blog_id)
            })?;
    }
    Ok(())
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn save_rankings_mysql(
    conn: &mut sqlx::MySqlConnection,
    rankings: &[Ranking],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM rankings")
        .execute(&mut *conn)
        .await
        .context("Failed to clear rankings")?;

    for rank in rankings {
        sqlx::query(INSERT_RANKING)
            .bind(&rank.blog_id)
            .bind(rank.position)
            .bind(rank.score)
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await
            .with_context(|| {
                format!("Failed to insert ranking {} for blog {}", rank.position, rank.blog_id)
            })?;
    }
    Ok(())
}
