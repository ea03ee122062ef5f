//! myblog batch commands
//!
//! ```text
//! batch calculate-popular-ranking <days>
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use myblog::{
    batch::{failure_message, BatchRunner},
    clock::SystemClock,
    config::Config,
    db::{self, queries::BlogStatsQuery, repositories::SqlxRankingRepository, Storage, UnitOfWork},
    lock::{create_lock_store, ExclusiveLock},
    services::RankingService,
};

#[derive(Parser)]
#[command(name = "batch", version, about = "myblog batch commands")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "config.yml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Recompute the popular-blog ranking from recent comments
    CalculatePopularRanking {
        /// Size of the comment window, in days
        days: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "myblog=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(&cli.config, cli.command).await {
        Ok(message) => {
            println!("{}", message);
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("Error: {}", message);
            ExitCode::FAILURE
        }
    }
}

async fn run(config_path: &Path, command: Command) -> Result<String, String> {
    let (runner, storage) = setup(config_path).await.map_err(|e| format!("{:#}", e))?;

    let result = match command {
        Command::CalculatePopularRanking { days } => runner
            .calculate_popular_ranking(&days)
            .await
            .map(|report| report.to_string())
            .map_err(|e| failure_message(&e)),
    };

    storage.close().await;
    result
}

async fn setup(config_path: &Path) -> Result<(BatchRunner, Storage)> {
    let config = Config::load_with_env(config_path)?;

    let storage = Storage::connect(&config.database).await?;
    db::migrations::run_migrations(storage.write()).await?;

    let clock = SystemClock::shared();
    let lock_store = create_lock_store(&config.lock, &storage, clock.clone()).await?;
    let ranking = Arc::new(RankingService::new(
        UnitOfWork::new(storage.clone()),
        Arc::new(BlogStatsQuery::new(clock.clone())),
        SqlxRankingRepository::boxed(clock.clone()),
        clock,
    ));

    let runner = BatchRunner::new(
        ExclusiveLock::new(lock_store),
        ranking,
        config.batch.lock_ttl(),
    );
    Ok((runner, storage))
}
