//! Unit of work
//!
//! [`UnitOfWork::run_in_transaction`] begins a transaction, hands the work a
//! transaction-bound [`DbHandle`], and commits or rolls back depending on the
//! work's result. The transaction's lifecycle belongs to the unit of work alone:
//! repositories only ever receive the handle.

use std::future::Future;

use super::handle::{DbHandle, Storage};
use crate::error::{AppResult, TransactionError};

/// Transaction manager
#[derive(Clone)]
pub struct UnitOfWork {
    storage: Storage,
}

impl UnitOfWork {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// A pool-bound handle for work outside any transaction
    pub fn handle(&self) -> DbHandle {
        self.storage.handle()
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Run `work` inside a new transaction.
    ///
    /// `scope` is the handle of the caller. Passing a transaction-bound handle
    /// is a nesting attempt and fails with [`TransactionError::Nested`] before
    /// any statement is issued.
    ///
    /// # Errors
    ///
    /// - [`TransactionError::Start`] if the transaction cannot be opened
    /// - the work's own error, after a successful rollback
    /// - [`TransactionError::Rollback`] carrying both errors if the rollback fails too
    /// - [`TransactionError::Commit`] if the commit fails; the work's value is dropped
    pub async fn run_in_transaction<T, F, Fut>(&self, scope: &DbHandle, work: F) -> AppResult<T>
    where
        F: FnOnce(DbHandle) -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        if scope.is_transactional() {
            tracing::error!("Refusing to open a transaction inside another transaction");
            return Err(TransactionError::Nested.into());
        }

        let tx = self.storage.begin().await?;
        tracing::debug!("Transaction started");

        match work(DbHandle::Tx(tx.clone())).await {
            Ok(value) => {
                tx.commit().await?;
                tracing::debug!("Transaction committed");
                Ok(value)
            }
            Err(err) => {
                tracing::warn!("Rolling back transaction: {}", err);
                if let Err(rollback) = tx.rollback().await {
                    tracing::error!("Rollback failed: {}", rollback);
                    return Err(TransactionError::Rollback {
                        rollback,
                        original: Box::new(err),
                    }
                    .into());
                }
                Err(err)
            }
        }
    }

    /// [`run_in_transaction`](Self::run_in_transaction) from the top level
    pub async fn transaction<T, F, Fut>(&self, work: F) -> AppResult<T>
    where
        F: FnOnce(DbHandle) -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let scope = self.handle();
        self.run_in_transaction(&scope, work).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseDriver;
    use crate::db::handle::Conn;
    use crate::db::create_test_pool;
    use crate::db::pool::{connect, PoolSettings};
    use crate::error::AppError;

    async fn setup_uow() -> UnitOfWork {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        pool.execute("CREATE TABLE entries (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
            .await
            .expect("Failed to create table");
        UnitOfWork::new(Storage::new(pool))
    }

    async fn insert(db: &DbHandle, name: &str) -> AppResult<()> {
        let mut lease = db.writer().await?;
        match lease.conn()? {
            Conn::Sqlite(conn) => {
                sqlx::query("INSERT INTO entries (name) VALUES (?)")
                    .bind(name)
                    .execute(conn)
                    .await
                    .map_err(anyhow::Error::from)?;
            }
            Conn::Mysql(_) => unreachable!(),
        }
        Ok(())
    }

    async fn count(db: &DbHandle) -> i64 {
        let mut lease = db.reader().await.unwrap();
        match lease.conn().unwrap() {
            Conn::Sqlite(conn) => sqlx::query_scalar("SELECT COUNT(*) FROM entries")
                .fetch_one(conn)
                .await
                .unwrap(),
            Conn::Mysql(_) => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_commit_on_success() {
        let uow = setup_uow().await;

        let value = uow
            .transaction(|tx| async move {
                insert(&tx, "a").await?;
                insert(&tx, "b").await?;
                Ok(42)
            })
            .await
            .expect("Transaction should commit");

        assert_eq!(value, 42);
        assert_eq!(count(&uow.handle()).await, 2);
    }

    #[tokio::test]
    async fn test_rollback_on_error_returns_original_error() {
        let uow = setup_uow().await;
        insert(&uow.handle(), "existing").await.unwrap();

        let result: AppResult<()> = uow
            .transaction(|tx| async move {
                insert(&tx, "a").await?;
                Err(AppError::not_found("entry", "missing"))
            })
            .await;

        assert!(matches!(result, Err(AppError::NotFound { entity: "entry", .. })));
        assert_eq!(count(&uow.handle()).await, 1);
    }

    #[tokio::test]
    async fn test_nested_transaction_fails_fast() {
        let uow = setup_uow().await;
        let inner_uow = uow.clone();

        let result: AppResult<()> = uow
            .transaction(|tx| async move {
                insert(&tx, "outer").await?;
                inner_uow
                    .run_in_transaction(&tx, |inner| async move { insert(&inner, "inner").await })
                    .await
            })
            .await;

        assert!(matches!(
            result,
            Err(AppError::Transaction(TransactionError::Nested))
        ));
        // The outer transaction rolled back as well
        assert_eq!(count(&uow.handle()).await, 0);
    }

    #[tokio::test]
    async fn test_leaked_handle_is_unusable_after_commit() {
        let uow = setup_uow().await;

        let leaked = uow
            .transaction(|tx| async move {
                insert(&tx, "a").await?;
                Ok(tx)
            })
            .await
            .expect("Transaction should commit");

        let result = insert(&leaked, "late").await;
        assert!(matches!(
            result,
            Err(AppError::Transaction(TransactionError::Finished))
        ));
        assert_eq!(count(&uow.handle()).await, 1);
    }

    /// One connection, so cleanup after a failed commit is visible to the next query
    async fn single_connection_uow() -> UnitOfWork {
        let pool = connect(
            DatabaseDriver::Sqlite,
            ":memory:",
            PoolSettings {
                max_connections: 1,
                max_lifetime: None,
            },
        )
        .await
        .unwrap();
        UnitOfWork::new(Storage::new(pool))
    }

    async fn exec(db: &DbHandle, sql: &str) -> AppResult<()> {
        let mut lease = db.writer().await?;
        match lease.conn()? {
            Conn::Sqlite(conn) => {
                sqlx::query(sql).execute(conn).await.map_err(anyhow::Error::from)?;
            }
            Conn::Mysql(_) => unreachable!(),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_commit_failure_discards_value_and_writes() {
        let uow = single_connection_uow().await;
        let db = uow.handle();
        exec(&db, "CREATE TABLE parents (id INTEGER PRIMARY KEY)").await.unwrap();
        exec(
            &db,
            "CREATE TABLE children (id INTEGER PRIMARY KEY, \
             parent_id INTEGER NOT NULL REFERENCES parents(id) DEFERRABLE INITIALLY DEFERRED)",
        )
        .await
        .unwrap();

        // The dangling reference is only checked at COMMIT
        let result = uow
            .transaction(|tx| async move {
                exec(&tx, "INSERT INTO children (parent_id) VALUES (99)").await?;
                Ok(42)
            })
            .await;

        assert!(matches!(
            result,
            Err(AppError::Transaction(TransactionError::Commit(_)))
        ));

        let mut lease = db.reader().await.unwrap();
        let children: i64 = match lease.conn().unwrap() {
            Conn::Sqlite(conn) => sqlx::query_scalar("SELECT COUNT(*) FROM children")
                .fetch_one(conn)
                .await
                .unwrap(),
            Conn::Mysql(_) => unreachable!(),
        };
        assert_eq!(children, 0);
    }

    #[tokio::test]
    async fn test_failed_rollback_keeps_both_errors() {
        let uow = single_connection_uow().await;
        exec(&uow.handle(), "CREATE TABLE entries (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
            .await
            .unwrap();

        // Ending the transaction behind the manager's back makes its ROLLBACK fail
        let result: AppResult<()> = uow
            .transaction(|tx| async move {
                insert(&tx, "a").await?;
                exec(&tx, "ROLLBACK").await?;
                Err(AppError::not_found("entry", "missing"))
            })
            .await;

        match result {
            Err(AppError::Transaction(TransactionError::Rollback { original, .. })) => {
                assert!(matches!(*original, AppError::NotFound { entity: "entry", .. }));
            }
            other => panic!("expected a rollback failure, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_start_failure_is_reported() {
        let uow = setup_uow().await;
        uow.storage().close().await;

        let result: AppResult<()> = uow.transaction(|_tx| async move { Ok(()) }).await;
        assert!(matches!(
            result,
            Err(AppError::Transaction(TransactionError::Start(_)))
        ));
    }
}
