//! Comment repository

use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;

use crate::db::{Conn, DbHandle};
use crate::error::{AppError, AppResult};
use crate::models::Comment;

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(&self, db: &DbHandle, comment: &Comment) -> AppResult<()>;

    async fn find_by_id(&self, db: &DbHandle, id: &str) -> AppResult<Comment>;

    /// Comments on a blog, oldest first
    async fn find_by_blog_id(&self, db: &DbHandle, blog_id: &str) -> AppResult<Vec<Comment>>;

    /// Comments written by a user, newest first
    async fn find_by_user_id(&self, db: &DbHandle, user_id: &str) -> AppResult<Vec<Comment>>;

    async fn update(&self, db: &DbHandle, comment: &Comment) -> AppResult<()>;

    async fn delete(&self, db: &DbHandle, id: &str) -> AppResult<()>;
}

pub struct SqlxCommentRepository;

impl SqlxCommentRepository {
    pub fn boxed() -> Arc<dyn CommentRepository> {
        Arc::new(Self)
    }
}

const SELECT_COMMENT: &str = r#"
    SELECT id, blog_id, user_id, content, created_at, updated_at
    FROM comments
"#;

const INSERT_COMMENT: &str = r#"
    INSERT INTO comments (id, blog_id, user_id, content, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, db: &DbHandle, comment: &Comment) -> AppResult<()> {
        let mut lease = db.writer().await?;
        match lease.conn()? {
            Conn::Sqlite(c) => sqlx::query(INSERT_COMMENT)
                .bind(&comment.id)
                .bind(&comment.blog_id)
                .bind(&comment.user_id)
                .bind(&comment.content)
                .bind(comment.created_at)
                .bind(comment.updated_at)
                .execute(c)
                .await
                .map(|_| ()),
            Conn::Mysql(c) => sqlx::query(INSERT_COMMENT)
                .bind(&comment.id)
                .bind(&comment.blog_id)
                .bind(&comment.user_id)
                .bind(&comment.content)
                .bind(comment.created_at)
                .bind(comment.updated_at)
                .execute(c)
                .await
                .map(|_| ()),
        }
        .with_context(|| format!("Failed to create comment {}", comment.id))?;
        Ok(())
    }

    async fn find_by_id(&self, db: &DbHandle, id: &str) -> AppResult<Comment> {
        let sql = format!("{} WHERE id = ?", SELECT_COMMENT);
        let mut lease = db.reader().await?;
        let comment = match lease.conn()? {
            Conn::Sqlite(c) => sqlx::query_as::<_, Comment>(&sql).bind(id).fetch_optional(c).await,
            Conn::Mysql(c) => sqlx::query_as::<_, Comment>(&sql).bind(id).fetch_optional(c).await,
        }
        .with_context(|| format!("Failed to find comment {}", id))?;

        comment.ok_or_else(|| AppError::not_found("comment", id))
    }

    async fn find_by_blog_id(&self, db: &DbHandle, blog_id: &str) -> AppResult<Vec<Comment>> {
        let sql = format!("{} WHERE blog_id = ? ORDER BY created_at ASC", SELECT_COMMENT);
        let mut lease = db.reader().await?;
        let comments = match lease.conn()? {
            Conn::Sqlite(c) => sqlx::query_as::<_, Comment>(&sql).bind(blog_id).fetch_all(c).await,
            Conn::Mysql(c) => sqlx::query_as::<_, Comment>(&sql).bind(blog_id).fetch_all(c).await,
        }
        .with_context(|| format!("Failed to list comments of blog {}", blog_id))?;
        Ok(comments)
    }

    async fn find_by_user_id(&self, db: &DbHandle, user_id: &str) -> AppResult<Vec<Comment>> {
        let sql = format!("{} WHERE user_id = ? ORDER BY created_at DESC", SELECT_COMMENT);
        let mut lease = db.reader().await?;
        let comments = match lease.conn()? {
            Conn::Sqlite(c) => sqlx::query_as::<_, Comment>(&sql).bind(user_id).fetch_all(c).await,
            Conn::Mysql(c) => sqlx::query_as::<_, Comment>(&sql).bind(user_id).fetch_all(c).await,
        }
        .with_context(|| format!("Failed to list comments of user {}", user_id))?;
        Ok(comments)
    }

    async fn update(&self, db: &DbHandle, comment: &Comment) -> AppResult<()> {
        let sql = "UPDATE comments SET content = ?, updated_at = ? WHERE id = ?";
        let mut lease = db.writer().await?;
        let affected = match lease.conn()? {
            Conn::Sqlite(c) => sqlx::query(sql)
                .bind(&comment.content)
                .bind(comment.updated_at)
                .bind(&comment.id)
                .execute(c)
                .await
                .map(|r| r.rows_affected()),
            Conn::Mysql(c) => sqlx::query(sql)
                .bind(&comment.content)
                .bind(comment.updated_at)
                .bind(&comment.id)
                .execute(c)
                .await
                .map(|r| r.rows_affected()),
        }
        .with_context(|| format!("Failed to update comment {}", comment.id))?;

        if affected == 0 {
            return Err(AppError::not_found("comment", &comment.id));
        }
        Ok(())
    }

    async fn delete(&self, db: &DbHandle, id: &str) -> AppResult<()> {
        let mut lease = db.writer().await?;
        let affected = match lease.conn()? {
            Conn::Sqlite(c) => sqlx::query("DELETE FROM comments WHERE id = ?")
                .bind(id)
                .execute(c)
                .await
                .map(|r| r.rows_affected()),
            Conn::Mysql(c) => sqlx::query("DELETE FROM comments WHERE id = ?")
                .bind(id)
                .execute(c)
                .await
                .map(|r| r.rows_affected()),
        }
        .with_context(|| format!("Failed to delete comment {}", id))?;

        if affected == 0 {
            return Err(AppError::not_found("comment", id));
        }
        Ok(())
    }
}
