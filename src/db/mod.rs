//! Database layer
//!
//! Storage for the myblog backend. It supports:
//! - SQLite (default, single-file deployment)
//! - MySQL
//!
//! # Architecture
//!
//! [`DatabasePool`] abstracts over the two backends. [`Storage`] owns the pools
//! and hands out [`DbHandle`]s; every repository method takes a handle as its
//! first argument, so the same call runs against the pool or inside a
//! transaction opened by [`UnitOfWork`].
//!
//! # Usage
//!
//! ```ignore
//! use myblog::db::{migrations, Storage, UnitOfWork};
//!
//! let storage = Storage::connect(&config.database).await?;
//! migrations::run_migrations(storage.write()).await?;
//!
//! let uow = UnitOfWork::new(storage.clone());
//! uow.transaction(|tx| async move {
//!     rankings.save_rankings(&tx, &entries).await
//! })
//! .await?;
//! ```

pub mod handle;
pub mod migrations;
pub mod pool;
pub mod queries;
pub mod repositories;
pub mod unit_of_work;

pub use handle::{Conn, DbHandle, Lease, Storage, TxHandle};
pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
pub use unit_of_work::UnitOfWork;

/// Storage over a migrated in-memory SQLite database
#[cfg(test)]
pub(crate) async fn test_storage() -> Storage {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    Storage::new(pool)
}
