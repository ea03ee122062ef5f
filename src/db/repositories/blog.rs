//! Blog repository
//!
//! Database operations for blogs. Listing queries are newest first.

use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;

use crate::db::{Conn, DbHandle};
use crate::error::{AppError, AppResult};
use crate::models::Blog;

/// Blog repository trait
#[async_trait]
pub trait BlogRepository: Send + Sync {
    async fn create(&self, db: &DbHandle, blog: &Blog) -> AppResult<()>;

    async fn find_by_id(&self, db: &DbHandle, id: &str) -> AppResult<Blog>;

    /// Blogs written by `user_id`, newest first
    async fn find_by_user_id(&self, db: &DbHandle, user_id: &str) -> AppResult<Vec<Blog>>;

    /// One page of all blogs, newest first
    async fn find_all(&self, db: &DbHandle, limit: i64, offset: i64) -> AppResult<Vec<Blog>>;

    /// Update title, content and `updated_at`. Zero matched rows is `NotFound`.
    async fn update(&self, db: &DbHandle, blog: &Blog) -> AppResult<()>;

    async fn delete(&self, db: &DbHandle, id: &str) -> AppResult<()>;
}

/// SQLx-based blog repository implementation
pub struct SqlxBlogRepository;

impl SqlxBlogRepository {
    /// Create a boxed repository for use with dependency injection
    pub fn boxed() -> Arc<dyn BlogRepository> {
        Arc::new(Self)
    }
}

const SELECT_BLOG: &str = r#"
    SELECT id, user_id, title, content, created_at, updated_at
    FROM blogs
"#;

const INSERT_BLOG: &str = r#"
    INSERT INTO blogs (id, user_id, title, content, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

const UPDATE_BLOG: &str = r#"
    UPDATE blogs
    SET title = ?, content = ?, updated_at = ?
    WHERE id = ?
"#;

#[async_trait]
impl BlogRepository for SqlxBlogRepository {
    async fn create(&self, db: &DbHandle, blog: &Blog) -> AppResult<()> {
        let mut lease = db.writer().await?;
        match lease.conn()? {
            Conn::Sqlite(c) => sqlx::query(INSERT_BLOG)
                .bind(&blog.id)
                .bind(&blog.user_id)
                .bind(&blog.title)
                .bind(&blog.content)
                .bind(blog.created_at)
                .bind(blog.updated_at)
                .execute(c)
                .await
                .map(|_| ()),
            Conn::Mysql(c) => sqlx::query(INSERT_BLOG)
                .bind(&blog.id)
                .bind(&blog.user_id)
                .bind(&blog.title)
                .bind(&blog.content)
                .bind(blog.created_at)
                .bind(blog.updated_at)
                .execute(c)
                .await
                .map(|_| ()),
        }
        .with_context(|| format!("Failed to create blog {}", blog.id))?;
        Ok(())
    }

    async fn find_by_id(&self, db: &DbHandle, id: &str) -> AppResult<Blog> {
        let sql = format!("{} WHERE id = ?", SELECT_BLOG);
        let mut lease = db.reader().await?;
        let blog = match lease.conn()? {
            Conn::Sqlite(c) => sqlx::query_as::<_, Blog>(&sql).bind(id).fetch_optional(c).await,
            Conn::Mysql(c) => sqlx::query_as::<_, Blog>(&sql).bind(id).fetch_optional(c).await,
        }
        .with_context(|| format!("Failed to find blog {}", id))?;

        blog.ok_or_else(|| AppError::not_found("blog", id))
    }

    async fn find_by_user_id(&self, db: &DbHandle, user_id: &str) -> AppResult<Vec<Blog>> {
        let sql = format!("{} WHERE user_id = ? ORDER BY created_at DESC", SELECT_BLOG);
        let mut lease = db.reader().await?;
        let blogs = match lease.conn()? {
            Conn::Sqlite(c) => sqlx::query_as::<_, Blog>(&sql).bind(user_id).fetch_all(c).await,
            Conn::Mysql(c) => sqlx::query_as::<_, Blog>(&sql).bind(user_id).fetch_all(c).await,
        }
        .with_context(|| format!("Failed to list blogs of user {}", user_id))?;
        Ok(blogs)
    }

    async fn find_all(&self, db: &DbHandle, limit: i64, offset: i64) -> AppResult<Vec<Blog>> {
        let sql = format!("{} ORDER BY created_at DESC LIMIT ? OFFSET ?", SELECT_BLOG);
        let mut lease = db.reader().await?;
        let blogs = match lease.conn()? {
            Conn::Sqlite(c) => {
                sqlx::query_as::<_, Blog>(&sql)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(c)
                    .await
            }
            Conn::Mysql(c) => {
                sqlx::query_as::<_, Blog>(&sql)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(c)
                    .await
            }
        }
        .context("Failed to list blogs")?;
        Ok(blogs)
    }

    async fn update(&self, db: &DbHandle, blog: &Blog) -> AppResult<()> {
        let mut lease = db.writer().await?;
        let affected = match lease.conn()? {
            Conn::Sqlite(c) => sqlx::query(UPDATE_BLOG)
                .bind(&blog.title)
                .bind(&blog.content)
                .bind(blog.updated_at)
                .bind(&blog.id)
                .execute(c)
                .await
                .map(|r| r.rows_affected()),
            Conn::Mysql(c) => sqlx::query(UPDATE_BLOG)
                .bind(&blog.title)
                .bind(&blog.content)
                .bind(blog.updated_at)
                .bind(&blog.id)
                .execute(c)
                .await
                .map(|r| r.rows_affected()),
        }
        .with_context(|| format!("Failed to update blog {}", blog.id))?;

        if affected == 0 {
            return Err(AppError::not_found("blog", &blog.id));
        }
        Ok(())
    }

    async fn delete(&self, db: &DbHandle, id: &str) -> AppResult<()> {
        let mut lease = db.writer().await?;
        let affected = match lease.conn()? {
            Conn::Sqlite(c) => sqlx::query("DELETE FROM blogs WHERE id = ?")
                .bind(id)
                .execute(c)
                .await
                .map(|r| r.rows_affected()),
            Conn::Mysql(c) => sqlx::query("DELETE FROM blogs WHERE id = ?")
                .bind(id)
                .execute(c)
                .await
                .map(|r| r.rows_affected()),
        }
        .with_context(|| format!("Failed to delete blog {}", id))?;

        if affected == 0 {
            return Err(AppError::not_found("blog", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::test_storage;
    use crate::models::User;
    use chrono::{Duration, Utc};

    async fn create_author(db: &DbHandle) -> User {
        let user = User::new("author".into(), "author@example.com".into(), "hash".into()).unwrap();
        SqlxUserRepository.create(db, &user).await.unwrap();
        user
    }

    async fn count_blogs(db: &DbHandle) -> usize {
        SqlxBlogRepository.find_all(db, 1000, 0).await.unwrap().len()
    }

    #[tokio::test]
    async fn test_create_and_find_blog() {
        let db = test_storage().await.handle();
        let author = create_author(&db).await;
        let blog = Blog::new(author.id.clone(), "Title".into(), "Body".into()).unwrap();

        SqlxBlogRepository.create(&db, &blog).await.expect("Failed to create blog");

        let found = SqlxBlogRepository.find_by_id(&db, &blog.id).await.unwrap();
        assert_eq!(found.title, "Title");
        assert_eq!(found.user_id, author.id);
    }

    #[tokio::test]
    async fn test_find_by_user_id_newest_first() {
        let db = test_storage().await.handle();
        let author = create_author(&db).await;
        let now = Utc::now();

        for (idx, title) in ["first", "second", "third"].iter().enumerate() {
            let mut blog = Blog::new(author.id.clone(), title.to_string(), "Body".into()).unwrap();
            blog.created_at = now + Duration::seconds(idx as i64);
            SqlxBlogRepository.create(&db, &blog).await.unwrap();
        }

        let blogs = SqlxBlogRepository.find_by_user_id(&db, &author.id).await.unwrap();
        let titles: Vec<_> = blogs.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["third", "second", "first"]);

        let page = SqlxBlogRepository.find_all(&db, 2, 2).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "first");
    }

    #[tokio::test]
    async fn test_update_blog() {
        let db = test_storage().await.handle();
        let author = create_author(&db).await;
        let mut blog = Blog::new(author.id.clone(), "Old".into(), "Body".into()).unwrap();
        SqlxBlogRepository.create(&db, &blog).await.unwrap();

        blog.title = "New".into();
        SqlxBlogRepository.update(&db, &blog).await.expect("Failed to update blog");

        let found = SqlxBlogRepository.find_by_id(&db, &blog.id).await.unwrap();
        assert_eq!(found.title, "New");
    }

    #[tokio::test]
    async fn test_update_missing_blog_is_not_found_and_leaves_table_unchanged() {
        let db = test_storage().await.handle();
        let author = create_author(&db).await;
        let existing = Blog::new(author.id.clone(), "Kept".into(), "Body".into()).unwrap();
        SqlxBlogRepository.create(&db, &existing).await.unwrap();
        let before = count_blogs(&db).await;

        let ghost = Blog::new(author.id.clone(), "Ghost".into(), "Body".into()).unwrap();
        let result = SqlxBlogRepository.update(&db, &ghost).await;

        assert!(matches!(result, Err(AppError::NotFound { entity: "blog", .. })));
        assert_eq!(count_blogs(&db).await, before);
        let kept = SqlxBlogRepository.find_by_id(&db, &existing.id).await.unwrap();
        assert_eq!(kept.title, "Kept");
    }

    #[tokio::test]
    async fn test_delete_blog() {
        let db = test_storage().await.handle();
        let author = create_author(&db).await;
        let blog = Blog::new(author.id.clone(), "Title".into(), "Body".into()).unwrap();
        SqlxBlogRepository.create(&db, &blog).await.unwrap();

        SqlxBlogRepository.delete(&db, &blog.id).await.unwrap();
        assert!(matches!(
            SqlxBlogRepository.delete(&db, &blog.id).await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_blog_requires_existing_user() {
        let db = test_storage().await.handle();
        let blog = Blog::new("nobody".into(), "Title".into(), "Body".into()).unwrap();

        let result = SqlxBlogRepository.create(&db, &blog).await;
        assert!(matches!(result, Err(AppError::Infrastructure(_))));
    }
}
