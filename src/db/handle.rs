//! Storage and repository handles
//!
//! [`Storage`] owns the connection pools and exposes separate read and write
//! accessors. [`DbHandle`] is the value repositories receive on every call: it is
//! bound either to the storage pools or to one open transaction, and the same
//! repository code runs unchanged against both.
//!
//! ```ignore
//! let db = storage.handle();
//! let blog = blog_repo.find_by_id(&db, &id).await?;
//!
//! uow.run_in_transaction(&db, |tx| async move {
//!     blog_repo.update(&tx, &blog).await
//! })
//! .await?;
//! ```

use anyhow::{anyhow, Context};
use sqlx::pool::PoolConnection;
use sqlx::{MySql, MySqlConnection, Sqlite, SqliteConnection, Transaction};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use super::pool::{connect, DynDatabasePool, PoolSettings};
use crate::config::DatabaseConfig;
use crate::error::{AppResult, TransactionError};

/// Owner of the physical connection pools
#[derive(Clone)]
pub struct Storage {
    write: DynDatabasePool,
    read: DynDatabasePool,
}

impl Storage {
    /// Storage whose reads and writes share one pool
    pub fn new(pool: DynDatabasePool) -> Self {
        Self {
            read: pool.clone(),
            write: pool,
        }
    }

    /// Storage with a separate pool for reads
    pub fn with_read_pool(write: DynDatabasePool, read: DynDatabasePool) -> Self {
        Self { write, read }
    }

    /// Open the pools described by `config`
    pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Self> {
        let settings = PoolSettings::from(config);
        let write = connect(config.driver, &config.url, settings).await?;
        match &config.read_url {
            Some(url) if url != &config.url => {
                let read = connect(config.driver, url, settings)
                    .await
                    .context("Failed to open read pool")?;
                Ok(Self::with_read_pool(write, read))
            }
            _ => Ok(Self::new(write)),
        }
    }

    pub fn read(&self) -> &DynDatabasePool {
        &self.read
    }

    pub fn write(&self) -> &DynDatabasePool {
        &self.write
    }

    /// A handle bound to the pools (no transaction)
    pub fn handle(&self) -> DbHandle {
        DbHandle::Pool(self.clone())
    }

    /// Begin a transaction on the write pool
    pub(crate) async fn begin(&self) -> Result<TxHandle, TransactionError> {
        if let Some(pool) = self.write.as_sqlite() {
            let tx = pool.begin().await.map_err(TransactionError::Start)?;
            return Ok(TxHandle::new(TxSlot::Sqlite(Mutex::new(Some(tx)))));
        }
        if let Some(pool) = self.write.as_mysql() {
            let tx = pool.begin().await.map_err(TransactionError::Start)?;
            return Ok(TxHandle::new(TxSlot::Mysql(Mutex::new(Some(tx)))));
        }
        Err(TransactionError::Start(sqlx::Error::Configuration(
            "database pool exposes no supported driver".into(),
        )))
    }

    pub async fn close(&self) {
        self.write.close().await;
        if !Arc::ptr_eq(&self.write, &self.read) {
            self.read.close().await;
        }
    }
}

enum TxSlot {
    Sqlite(Mutex<Option<Transaction<'static, Sqlite>>>),
    Mysql(Mutex<Option<Transaction<'static, MySql>>>),
}

/// Shared reference to one open transaction.
///
/// Clones refer to the same transaction. Only the unit of work commits or rolls
/// it back; afterwards every clone reports [`TransactionError::Finished`].
#[derive(Clone)]
pub struct TxHandle {
    slot: Arc<TxSlot>,
}

impl TxHandle {
    fn new(slot: TxSlot) -> Self {
        Self {
            slot: Arc::new(slot),
        }
    }

    pub(crate) async fn commit(&self) -> Result<(), TransactionError> {
        match &*self.slot {
            TxSlot::Sqlite(slot) => {
                let tx = slot.lock().await.take().ok_or(TransactionError::Finished)?;
                tx.commit().await.map_err(TransactionError::Commit)
            }
            TxSlot::Mysql(slot) => {
                let tx = slot.lock().await.take().ok_or(TransactionError::Finished)?;
                tx.commit().await.map_err(TransactionError::Commit)
            }
        }
    }

    /// Roll back. A transaction that is already finished has nothing to undo.
    pub(crate) async fn rollback(&self) -> Result<(), sqlx::Error> {
        match &*self.slot {
            TxSlot::Sqlite(slot) => match slot.lock().await.take() {
                Some(tx) => tx.rollback().await,
                None => Ok(()),
            },
            TxSlot::Mysql(slot) => match slot.lock().await.take() {
                Some(tx) => tx.rollback().await,
                None => Ok(()),
            },
        }
    }

    async fn lease(&self) -> Lease<'_> {
        match &*self.slot {
            TxSlot::Sqlite(slot) => Lease::SqliteTx(slot.lock().await),
            TxSlot::Mysql(slot) => Lease::MysqlTx(slot.lock().await),
        }
    }
}

/// Explicit repository handle: pool-bound or transaction-bound
#[derive(Clone)]
pub enum DbHandle {
    Pool(Storage),
    Tx(TxHandle),
}

impl DbHandle {
    pub fn is_transactional(&self) -> bool {
        matches!(self, Self::Tx(_))
    }

    /// Connection for a read statement
    pub async fn reader(&self) -> AppResult<Lease<'_>> {
        match self {
            Self::Pool(storage) => lease_from_pool(storage.read()).await,
            Self::Tx(tx) => Ok(tx.lease().await),
        }
    }

    /// Connection for a write statement
    pub async fn writer(&self) -> AppResult<Lease<'_>> {
        match self {
            Self::Pool(storage) => lease_from_pool(storage.write()).await,
            Self::Tx(tx) => Ok(tx.lease().await),
        }
    }
}

async fn lease_from_pool(pool: &DynDatabasePool) -> AppResult<Lease<'static>> {
    if let Some(pool) = pool.as_sqlite() {
        let conn = pool
            .acquire()
            .await
            .context("Failed to acquire SQLite connection")?;
        return Ok(Lease::Sqlite(conn));
    }
    if let Some(pool) = pool.as_mysql() {
        let conn = pool
            .acquire()
            .await
            .context("Failed to acquire MySQL connection")?;
        return Ok(Lease::Mysql(conn));
    }
    Err(anyhow!("database pool exposes no supported driver").into())
}

/// A connection held for the duration of one repository operation.
///
/// Pool leases return their connection when dropped; transaction leases hold
/// the transaction's lock so statements on one transaction never interleave.
/// Drop a transaction lease before committing or rolling back that transaction.
pub enum Lease<'a> {
    Sqlite(PoolConnection<Sqlite>),
    Mysql(PoolConnection<MySql>),
    SqliteTx(MutexGuard<'a, Option<Transaction<'static, Sqlite>>>),
    MysqlTx(MutexGuard<'a, Option<Transaction<'static, MySql>>>),
}

/// Driver-specific connection borrowed from a [`Lease`]
pub enum Conn<'c> {
    Sqlite(&'c mut SqliteConnection),
    Mysql(&'c mut MySqlConnection),
}

impl Lease<'_> {
    pub fn conn(&mut self) -> AppResult<Conn<'_>> {
        match self {
            Lease::Sqlite(conn) => Ok(Conn::Sqlite(&mut **conn)),
            Lease::Mysql(conn) => Ok(Conn::Mysql(&mut **conn)),
            Lease::SqliteTx(guard) => {
                let tx = Option::as_mut(&mut **guard).ok_or(TransactionError::Finished)?;
                Ok(Conn::Sqlite(&mut **tx))
            }
            Lease::MysqlTx(guard) => {
                let tx = Option::as_mut(&mut **guard).ok_or(TransactionError::Finished)?;
                Ok(Conn::Mysql(&mut **tx))
            }
        }
    }
}
