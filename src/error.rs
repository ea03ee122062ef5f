//! Error taxonomy
//!
//! Every layer of myblog reports failures as an [`AppError`]. The variant is the
//! error *kind*: the HTTP layer maps it to a status code and the batch maps any of
//! them to a non-zero exit. Storage failures that callers cannot interpret are
//! carried as [`AppError::Infrastructure`] with `anyhow` context attached.

use std::fmt::Display;

/// Result alias used across repositories, services and handlers
pub type AppResult<T> = Result<T, AppError>;

/// Application error
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Entity absent
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Bad input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Another holder owns the named lock
    #[error("Lock '{0}' is already held")]
    AlreadyLocked(String),

    /// Missing or invalid credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed to touch the resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Uniqueness violation detected by a service (e.g. duplicate email)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Begin/commit/rollback failure
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Opaque storage or runtime failure
    #[error("{0:#}")]
    Infrastructure(#[from] anyhow::Error),
}

/// Transaction lifecycle failures raised by the unit of work
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("Failed to begin transaction: {0}")]
    Start(#[source] sqlx::Error),

    #[error("Failed to commit transaction: {0}")]
    Commit(#[source] sqlx::Error),

    /// The rollback failed after the work failed. Both causes are kept.
    #[error("Failed to roll back transaction ({rollback}) after error: {original}")]
    Rollback {
        #[source]
        rollback: sqlx::Error,
        original: Box<AppError>,
    },

    #[error("Nested transactions are not supported")]
    Nested,

    #[error("Transaction has already been committed or rolled back")]
    Finished,
}

impl AppError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Attach operation context without changing the error kind.
    ///
    /// Infrastructure errors get an extra `anyhow` context frame. Kinds whose
    /// payload is a message get the context prefixed to it. Structured kinds
    /// (`NotFound`, `AlreadyLocked`, `Transaction`) are returned unchanged so
    /// that callers can still match on their fields.
    pub fn context<C>(self, context: C) -> Self
    where
        C: Display + Send + Sync + 'static,
    {
        match self {
            Self::Infrastructure(e) => Self::Infrastructure(e.context(context)),
            Self::Validation(msg) => Self::Validation(format!("{}: {}", context, msg)),
            Self::Unauthorized(msg) => Self::Unauthorized(format!("{}: {}", context, msg)),
            Self::Forbidden(msg) => Self::Forbidden(format!("{}: {}", context, msg)),
            Self::Conflict(msg) => Self::Conflict(format!("{}: {}", context, msg)),
            other => other,
        }
    }

    /// Short machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::AlreadyLocked(_) => "ALREADY_LOCKED",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Conflict(_) => "CONFLICT",
            Self::Transaction(_) => "TRANSACTION_ERROR",
            Self::Infrastructure(_) => "INTERNAL_ERROR",
        }
    }
}

/// Extension for attaching context to `AppResult`s
pub trait ResultExt<T> {
    fn op_context<C>(self, context: C) -> AppResult<T>
    where
        C: Display + Send + Sync + 'static;
}

impl<T> ResultExt<T> for AppResult<T> {
    fn op_context<C>(self, context: C) -> AppResult<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.map_err(|e| e.context(context))
    }
}
