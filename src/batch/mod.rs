//! Batch commands
//!
//! Each command runs under an exclusive lock named after the command, so two
//! invocations never overlap, whichever host they start on (with a shared lock
//! store).

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{AppError, AppResult};
use crate::lock::ExclusiveLock;
use crate::services::RankingService;

/// Command name, also used as its lock id
pub const CALCULATE_POPULAR_RANKING: &str = "calculate-popular-ranking";

/// Outcome of a successful command
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub command: &'static str,
    pub processed: usize,
    pub elapsed: Duration,
}

impl std::fmt::Display for BatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} completed in {:.2?}", self.command, self.elapsed)
    }
}

pub struct BatchRunner {
    lock: ExclusiveLock,
    ranking: Arc<RankingService>,
    lock_ttl: Duration,
}

impl BatchRunner {
    pub fn new(lock: ExclusiveLock, ranking: Arc<RankingService>, lock_ttl: Duration) -> Self {
        Self {
            lock,
            ranking,
            lock_ttl,
        }
    }

    /// `calculate-popular-ranking <days>`
    pub async fn calculate_popular_ranking(&self, days: &str) -> AppResult<BatchReport> {
        let days = parse_days(days)?;
        let started = Instant::now();

        let ranking = self.ranking.clone();
        let generation = self
            .lock
            .with_lock(CALCULATE_POPULAR_RANKING, self.lock_ttl, async move {
                ranking.calculate_popular_ranking(days).await
            })
            .await?;

        let report = BatchReport {
            command: CALCULATE_POPULAR_RANKING,
            processed: generation.len(),
            elapsed: started.elapsed(),
        };
        tracing::info!("{} ({} blogs ranked)", report, report.processed);
        Ok(report)
    }
}

/// Parse the `days` argument: an integer greater than zero
pub fn parse_days(raw: &str) -> AppResult<i64> {
    let days: i64 = raw
        .trim()
        .parse()
        .map_err(|_| AppError::validation(format!("days must be an integer, got '{}'", raw)))?;
    if days <= 0 {
        return Err(AppError::validation(format!(
            "days must be greater than zero, got {}",
            days
        )));
    }
    Ok(days)
}

/// Message printed on stderr when a command fails
pub fn failure_message(err: &AppError) -> String {
    match err {
        AppError::AlreadyLocked(id) => format!("{} is already running", id),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::db::queries::BlogStatsQuery;
    use crate::db::repositories::{RankingRepository, SqlxRankingRepository};
    use crate::db::{test_storage, UnitOfWork};
    use crate::lock::MemoryLockStore;
    use chrono::Utc;

    const TTL: Duration = Duration::from_secs(600);

    async fn runner() -> (BatchRunner, ExclusiveLock, crate::db::Storage) {
        let storage = test_storage().await;
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let ranking = Arc::new(RankingService::new(
            UnitOfWork::new(storage.clone()),
            Arc::new(BlogStatsQuery::new(clock.clone())),
            SqlxRankingRepository::boxed(clock.clone()),
            clock.clone(),
        ));
        let lock = ExclusiveLock::new(Arc::new(MemoryLockStore::new(clock)));
        (BatchRunner::new(lock.clone(), ranking, TTL), lock, storage)
    }

    #[test]
    fn test_parse_days() {
        assert_eq!(parse_days("7").unwrap(), 7);
        assert_eq!(parse_days(" 30 ").unwrap(), 30);
        for bad in ["0", "-1", "abc", "", "1.5"] {
            assert!(
                matches!(parse_days(bad), Err(AppError::Validation(_))),
                "'{}' should be rejected",
                bad
            );
        }
    }

    #[tokio::test]
    async fn test_runs_and_releases_lock() {
        let (runner, lock, _storage) = runner().await;

        let report = runner.calculate_popular_ranking("7").await.unwrap();
        assert_eq!(report.command, CALCULATE_POPULAR_RANKING);
        assert_eq!(report.processed, 0);
        assert!(report
            .to_string()
            .starts_with("calculate-popular-ranking completed in"));

        let guard = lock.lock(CALCULATE_POPULAR_RANKING, TTL).await;
        assert!(guard.is_ok(), "lock should be free after the run");
    }

    #[tokio::test]
    async fn test_refuses_to_overlap() {
        let (runner, lock, storage) = runner().await;
        let _running = lock.lock(CALCULATE_POPULAR_RANKING, TTL).await.unwrap();

        let err = runner.calculate_popular_ranking("7").await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyLocked(_)));
        assert_eq!(
            failure_message(&err),
            "calculate-popular-ranking is already running"
        );

        let stored = SqlxRankingRepository::default()
            .get_rankings(&storage.handle(), 10)
            .await
            .unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn test_bad_days_never_takes_lock() {
        let (runner, lock, _storage) = runner().await;

        assert!(matches!(
            runner.calculate_popular_ranking("0").await,
            Err(AppError::Validation(_))
        ));
        assert!(lock.lock(CALCULATE_POPULAR_RANKING, TTL).await.is_ok());
    }
}
