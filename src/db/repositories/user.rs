//! User repository
//!
//! Database operations for users.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;

use crate::db::{Conn, DbHandle};
use crate::error::{AppError, AppResult};
use crate::models::User;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user; a taken email is a `Conflict`
    async fn create(&self, db: &DbHandle, user: &User) -> AppResult<()>;

    async fn find_by_id(&self, db: &DbHandle, id: &str) -> AppResult<User>;

    async fn find_by_email(&self, db: &DbHandle, email: &str) -> AppResult<User>;

    async fn update(&self, db: &DbHandle, user: &User) -> AppResult<()>;

    async fn delete(&self, db: &DbHandle, id: &str) -> AppResult<()>;
}

/// SQLx-based user repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxUserRepository;

impl SqlxUserRepository {
    /// Create a boxed repository for use with dependency injection
    pub fn boxed() -> Arc<dyn UserRepository> {
        Arc::new(Self)
    }
}

const SELECT_USER: &str = r#"
    SELECT id, username, email, password_hash, created_at, updated_at
    FROM users
"#;

const INSERT_USER: &str = r#"
    INSERT INTO users (id, username, email, password_hash, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

const UPDATE_USER: &str = r#"
    UPDATE users
    SET username = ?, email = ?, password_hash = ?, updated_at = ?
    WHERE id = ?
"#;

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, db: &DbHandle, user: &User) -> AppResult<()> {
        let mut lease = db.writer().await?;
        let result = match lease.conn()? {
            Conn::Sqlite(c) => {
                sqlx::query(INSERT_USER)
                    .bind(&user.id)
                    .bind(&user.username)
                    .bind(&user.email)
                    .bind(&user.password_hash)
                    .bind(user.created_at)
                    .bind(user.updated_at)
                    .execute(c)
                    .await
                    .map(|_| ())
            }
            Conn::Mysql(c) => {
                sqlx::query(INSERT_USER)
                    .bind(&user.id)
                    .bind(&user.username)
                    .bind(&user.email)
                    .bind(&user.password_hash)
                    .bind(user.created_at)
                    .bind(user.updated_at)
                    .execute(c)
                    .await
                    .map(|_| ())
            }
        };

        match result {
            Err(e) if is_unique_violation(&e) => Err(AppError::Conflict(format!(
                "email already registered: {}",
                user.email
            ))),
            other => Ok(other.with_context(|| format!("Failed to create user {}", user.id))?),
        }
    }

    async fn find_by_id(&self, db: &DbHandle, id: &str) -> AppResult<User> {
        let sql = format!("{} WHERE id = ?", SELECT_USER);
        let mut lease = db.reader().await?;
        let user = match lease.conn()? {
            Conn::Sqlite(c) => sqlx::query_as::<_, User>(&sql).bind(id).fetch_optional(c).await,
            Conn::Mysql(c) => sqlx::query_as::<_, User>(&sql).bind(id).fetch_optional(c).await,
        }
        .with_context(|| format!("Failed to find user {}", id))?;

        user.ok_or_else(|| AppError::not_found("user", id))
    }

    async fn find_by_email(&self, db: &DbHandle, email: &str) -> AppResult<User> {
        let sql = format!("{} WHERE email = ?", SELECT_USER);
        let mut lease = db.reader().await?;
        let user = match lease.conn()? {
            Conn::Sqlite(c) => sqlx::query_as::<_, User>(&sql).bind(email).fetch_optional(c).await,
            Conn::Mysql(c) => sqlx::query_as::<_, User>(&sql).bind(email).fetch_optional(c).await,
        }
        .with_context(|| format!("Failed to find user by email {}", email))?;

        user.ok_or_else(|| AppError::not_found("user", email))
    }

    async fn update(&self, db: &DbHandle, user: &User) -> AppResult<()> {
        let mut lease = db.writer().await?;
        let result = match lease.conn()? {
            Conn::Sqlite(c) => sqlx::query(UPDATE_USER)
                .bind(&user.username)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(user.updated_at)
                .bind(&user.id)
                .execute(c)
                .await
                .map(|r| r.rows_affected()),
            Conn::Mysql(c) => sqlx::query(UPDATE_USER)
                .bind(&user.username)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(user.updated_at)
                .bind(&user.id)
                .execute(c)
                .await
                .map(|r| r.rows_affected()),
        };

        let affected = match result {
            Err(e) if is_unique_violation(&e) => {
                return Err(AppError::Conflict(format!(
                    "email already registered: {}",
                    user.email
                )))
            }
            other => other.with_context(|| format!("Failed to update user {}", user.id))?,
        };
        if affected == 0 {
            return Err(AppError::not_found("user", &user.id));
        }
        Ok(())
    }

    async fn delete(&self, db: &DbHandle, id: &str) -> AppResult<()> {
        let mut lease = db.writer().await?;
        let affected = match lease.conn()? {
            Conn::Sqlite(c) => sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id)
                .execute(c)
                .await
                .map(|r| r.rows_affected()),
            Conn::Mysql(c) => sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id)
                .execute(c)
                .await
                .map(|r| r.rows_affected()),
        }
        .with_context(|| format!("Failed to delete user {}", id))?;

        if affected == 0 {
            return Err(AppError::not_found("user", id));
        }
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|e| e.is_unique_violation())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_storage;

    fn create_test_user(username: &str, email: &str) -> User {
        User::new(username.to_string(), email.to_string(), "hash".to_string())
            .expect("Failed to build user")
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let db = test_storage().await.handle();
        let repo = SqlxUserRepository;
        let user = create_test_user("testuser", "test@example.com");

        repo.create(&db, &user).await.expect("Failed to create user");

        let by_id = repo.find_by_id(&db, &user.id).await.expect("Failed to find user");
        assert_eq!(by_id.username, "testuser");
        assert_eq!(by_id.password_hash, "hash");

        let by_email = repo
            .find_by_email(&db, "test@example.com")
            .await
            .expect("Failed to find user by email");
        assert_eq!(by_email.id, user.id);
    }

    #[tokio::test]
    async fn test_find_missing_user_is_not_found() {
        let db = test_storage().await.handle();
        let repo = SqlxUserRepository;

        let result = repo.find_by_id(&db, "missing").await;
        assert!(matches!(result, Err(AppError::NotFound { entity: "user", .. })));

        let result = repo.find_by_email(&db, "nobody@example.com").await;
        assert!(matches!(result, Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let db = test_storage().await.handle();
        let repo = SqlxUserRepository;

        repo.create(&db, &create_test_user("a", "same@example.com"))
            .await
            .unwrap();
        let result = repo
            .create(&db, &create_test_user("b", "same@example.com"))
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_update_user() {
        let db = test_storage().await.handle();
        let repo = SqlxUserRepository;
        let mut user = create_test_user("before", "before@example.com");
        repo.create(&db, &user).await.unwrap();

        user.username = "after".to_string();
        user.touch();
        repo.update(&db, &user).await.expect("Failed to update user");

        let found = repo.find_by_id(&db, &user.id).await.unwrap();
        assert_eq!(found.username, "after");
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_user_is_not_found() {
        let db = test_storage().await.handle();
        let repo = SqlxUserRepository;
        let ghost = create_test_user("ghost", "ghost@example.com");

        assert!(matches!(
            repo.update(&db, &ghost).await,
            Err(AppError::NotFound { .. })
        ));
        assert!(matches!(
            repo.delete(&db, &ghost.id).await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_user() {
        let db = test_storage().await.handle();
        let repo = SqlxUserRepository;
        let user = create_test_user("gone", "gone@example.com");
        repo.create(&db, &user).await.unwrap();

        repo.delete(&db, &user.id).await.expect("Failed to delete user");

        assert!(matches!(
            repo.find_by_id(&db, &user.id).await,
            Err(AppError::NotFound { .. })
        ));
    }
}
