//! Ranking aggregation query
//!
//! Counts, for every blog, the comments created inside a trailing window of days.
//! Blogs without recent comments are kept with a count of zero. The window's
//! cutoff is computed from the injected clock and bound as a parameter, so the
//! same statement runs on SQLite and MySQL.

use anyhow::Context;
use chrono::Duration;
use std::sync::Arc;

use crate::clock::{Clock, DynClock};
use crate::db::{Conn, DbHandle};
use crate::error::{AppError, AppResult};
use crate::models::BlogStat;

/// Turns a blog's statistics into its ranking score
pub trait ScorePolicy: Send + Sync {
    fn score(&self, comment_count: i64) -> i64;
}

/// Score equals the number of comments in the window
#[derive(Debug, Clone, Copy, Default)]
pub struct CommentCountPolicy;

impl ScorePolicy for CommentCountPolicy {
    fn score(&self, comment_count: i64) -> i64 {
        comment_count
    }
}

const BLOG_STATS_SQL: &str = r#"
    SELECT
        b.id AS blog_id,
        COALESCE(c.comment_count, 0) AS comment_count
    FROM blogs b
    LEFT JOIN (
        SELECT blog_id, COUNT(*) AS comment_count
        FROM comments
        WHERE created_at >= ?
        GROUP BY blog_id
    ) c ON b.id = c.blog_id
    ORDER BY comment_count DESC, b.id ASC
"#;

/// Per-blog statistics for the ranking batch
pub struct BlogStatsQuery {
    clock: DynClock,
    policy: Arc<dyn ScorePolicy>,
}

impl BlogStatsQuery {
    pub fn new(clock: DynClock) -> Self {
        Self::with_policy(clock, Arc::new(CommentCountPolicy))
    }

    pub fn with_policy(clock: DynClock, policy: Arc<dyn ScorePolicy>) -> Self {
        Self { clock, policy }
    }

    /// Statistics for every blog over the last `window_days` days.
    ///
    /// Ordered by score descending, ties broken by blog id ascending.
    pub async fn get_ranking_data(&self, db: &DbHandle, window_days: i64) -> AppResult<Vec<BlogStat>> {
        if window_days <= 0 {
            return Err(AppError::validation(format!(
                "window must be a positive number of days, got {}",
                window_days
            )));
        }
        let cutoff = self.clock.now() - Duration::days(window_days);

        let mut lease = db.reader().await?;
        let rows: Vec<(String, i64)> = match lease.conn()? {
            Conn::Sqlite(c) => sqlx::query_as::<_, (String, i64)>(BLOG_STATS_SQL).bind(cutoff).fetch_all(c).await,
            Conn::Mysql(c) => sqlx::query_as::<_, (String, i64)>(BLOG_STATS_SQL).bind(cutoff).fetch_all(c).await,
        }
        .with_context(|| format!("Failed to aggregate blog stats for {} days", window_days))?;

        let mut stats: Vec<BlogStat> = rows
            .into_iter()
            .map(|(blog_id, comment_count)| BlogStat {
                score: self.policy.score(comment_count),
                blog_id,
                comment_count,
            })
            .collect();
        // Stable: rows with equal score keep the query's blog id order
        stats.sort_by(|a, b| b.score.cmp(&a.score));

        tracing::debug!("Aggregated stats for {} blogs (cutoff {})", stats.len(), cutoff);
        Ok(stats)
    }
}
