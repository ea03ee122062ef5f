//! Popular-blog ranking
//!
//! [`RankingService::calculate_popular_ranking`] aggregates recent comment
//! activity, assigns positions 1..N in score order and replaces the stored
//! generation inside one transaction. Readers see either the previous generation
//! or the new one, never a mix.

use std::sync::Arc;

use crate::clock::{Clock, DynClock};
use crate::db::queries::BlogStatsQuery;
use crate::db::repositories::RankingRepository;
use crate::db::UnitOfWork;
use crate::error::{AppError, AppResult, ResultExt};
use crate::models::{BlogStat, Ranking};

/// Default number of entries returned to readers
pub const DEFAULT_RANKING_LIMIT: i64 = 10;

pub struct RankingService {
    uow: UnitOfWork,
    stats: Arc<BlogStatsQuery>,
    rankings: Arc<dyn RankingRepository>,
    clock: DynClock,
}

impl RankingService {
    pub fn new(
        uow: UnitOfWork,
        stats: Arc<BlogStatsQuery>,
        rankings: Arc<dyn RankingRepository>,
        clock: DynClock,
    ) -> Self {
        Self {
            uow,
            stats,
            rankings,
            clock,
        }
    }

    /// Recompute the ranking over the last `window_days` days.
    ///
    /// Returns the new generation. Zero blogs produce an empty generation.
    pub async fn calculate_popular_ranking(&self, window_days: i64) -> AppResult<Vec<Ranking>> {
        if window_days <= 0 {
            return Err(AppError::validation(format!(
                "days must be a positive integer, got {}",
                window_days
            )));
        }

        let stats = self
            .stats
            .get_ranking_data(&self.uow.handle(), window_days)
            .await
            .op_context("Failed to load blog statistics")?;
        let generation = build_ranking(&stats, self.clock.now());

        let rankings = self.rankings.clone();
        let entries = generation.clone();
        self.uow
            .transaction(|tx| async move { rankings.save_rankings(&tx, &entries).await })
            .await
            .op_context("Failed to save rankings")?;

        tracing::info!(
            "Ranked {} blogs over the last {} days",
            generation.len(),
            window_days
        );
        Ok(generation)
    }

    /// The current generation, best first
    pub async fn get_rankings(&self, limit: i64) -> AppResult<Vec<Ranking>> {
        if limit <= 0 {
            return Err(AppError::validation("limit must be positive"));
        }
        self.rankings.get_rankings(&self.uow.handle(), limit).await
    }
}

/// Assign positions in the order given: position = index + 1
fn build_ranking(stats: &[BlogStat], now: chrono::DateTime<chrono::Utc>) -> Vec<Ranking> {
    stats
        .iter()
        .enumerate()
        .map(|(idx, stat)| Ranking::new(stat.blog_id.clone(), idx as i32 + 1, stat.score, now))
        .collect()
}
