//! Blog service
//!
//! Creating, listing and editing blogs. Only a blog's author may change or
//! delete it.

use std::sync::Arc;

use crate::db::repositories::{BlogRepository, UserRepository};
use crate::db::UnitOfWork;
use crate::error::{AppError, AppResult};
use crate::models::{Blog, CreateBlogInput, PageParams, UpdateBlogInput};

pub struct BlogService {
    uow: UnitOfWork,
    blogs: Arc<dyn BlogRepository>,
    users: Arc<dyn UserRepository>,
}

impl BlogService {
    pub fn new(
        uow: UnitOfWork,
        blogs: Arc<dyn BlogRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self { uow, blogs, users }
    }

    /// Create a blog authored by `user_id`; the user must exist
    pub async fn create(&self, user_id: &str, input: CreateBlogInput) -> AppResult<Blog> {
        let blog = Blog::new(user_id.to_string(), input.title, input.content)?;

        let (blogs, users) = (self.blogs.clone(), self.users.clone());
        let blog = self
            .uow
            .transaction(|tx| async move {
                users.find_by_id(&tx, &blog.user_id).await?;
                blogs.create(&tx, &blog).await?;
                Ok(blog)
            })
            .await?;

        tracing::info!("Created blog {} by user {}", blog.id, blog.user_id);
        Ok(blog)
    }

    pub async fn get(&self, id: &str) -> AppResult<Blog> {
        self.blogs.find_by_id(&self.uow.handle(), id).await
    }

    /// Blogs of one user, newest first
    pub async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<Blog>> {
        let db = self.uow.handle();
        self.users.find_by_id(&db, user_id).await?;
        self.blogs.find_by_user_id(&db, user_id).await
    }

    /// One page of all blogs, newest first
    pub async fn list(&self, params: PageParams) -> AppResult<Vec<Blog>> {
        self.blogs
            .find_all(&self.uow.handle(), params.limit(), params.offset())
            .await
    }

    pub async fn update(&self, actor_id: &str, id: &str, input: UpdateBlogInput) -> AppResult<Blog> {
        let blogs = self.blogs.clone();
        let (actor_id, id) = (actor_id.to_string(), id.to_string());
        self.uow
            .transaction(|tx| async move {
                let mut blog = blogs.find_by_id(&tx, &id).await?;
                if !blog.is_owned_by(&actor_id) {
                    return Err(AppError::Forbidden(format!("blog {} belongs to another user", id)));
                }
                blog.apply(input)?;
                blogs.update(&tx, &blog).await?;
                Ok(blog)
            })
            .await
    }

    pub async fn delete(&self, actor_id: &str, id: &str) -> AppResult<()> {
        let blogs = self.blogs.clone();
        let (actor_id, id) = (actor_id.to_string(), id.to_string());
        self.uow
            .transaction(|tx| async move {
                let blog = blogs.find_by_id(&tx, &id).await?;
                if !blog.is_owned_by(&actor_id) {
                    return Err(AppError::Forbidden(format!("blog {} belongs to another user", id)));
                }
                blogs.delete(&tx, &id).await
            })
            .await
    }
}
