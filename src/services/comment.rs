//! Comment service

use std::sync::Arc;

use crate::db::repositories::{BlogRepository, CommentRepository, UserRepository};
use crate::db::UnitOfWork;
use crate::error::{AppError, AppResult};
use crate::models::{Comment, CreateCommentInput, UpdateCommentInput};

pub struct CommentService {
    uow: UnitOfWork,
    comments: Arc<dyn CommentRepository>,
    blogs: Arc<dyn BlogRepository>,
    users: Arc<dyn UserRepository>,
}

impl CommentService {
    pub fn new(
        uow: UnitOfWork,
        comments: Arc<dyn CommentRepository>,
        blogs: Arc<dyn BlogRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            uow,
            comments,
            blogs,
            users,
        }
    }

    /// Comment on a blog. The blog and the user are checked and the comment
    /// inserted inside one transaction.
    pub async fn create(
        &self,
        blog_id: &str,
        user_id: &str,
        input: CreateCommentInput,
    ) -> AppResult<Comment> {
        let comment = Comment::new(blog_id.to_string(), user_id.to_string(), input.content)?;

        let (comments, blogs, users) = (self.comments.clone(), self.blogs.clone(), self.users.clone());
        let comment = self
            .uow
            .transaction(|tx| async move {
                blogs.find_by_id(&tx, &comment.blog_id).await?;
                users.find_by_id(&tx, &comment.user_id).await?;
                comments.create(&tx, &comment).await?;
                Ok(comment)
            })
            .await?;

        tracing::debug!("Created comment {} on blog {}", comment.id, comment.blog_id);
        Ok(comment)
    }

    pub async fn get(&self, id: &str) -> AppResult<Comment> {
        self.comments.find_by_id(&self.uow.handle(), id).await
    }

    /// Comments on a blog, oldest first
    pub async fn list_by_blog(&self, blog_id: &str) -> AppResult<Vec<Comment>> {
        let db = self.uow.handle();
        self.blogs.find_by_id(&db, blog_id).await?;
        self.comments.find_by_blog_id(&db, blog_id).await
    }

    /// Comments written by a user, newest first
    pub async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<Comment>> {
        let db = self.uow.handle();
        self.users.find_by_id(&db, user_id).await?;
        self.comments.find_by_user_id(&db, user_id).await
    }

    pub async fn update(
        &self,
        actor_id: &str,
        id: &str,
        input: UpdateCommentInput,
    ) -> AppResult<Comment> {
        let comments = self.comments.clone();
        let (actor_id, id) = (actor_id.to_string(), id.to_string());
        self.uow
            .transaction(|tx| async move {
                let mut comment = comments.find_by_id(&tx, &id).await?;
                if !comment.is_owned_by(&actor_id) {
                    return Err(AppError::Forbidden(format!("comment {} belongs to another user", id)));
                }
                comment.update_content(input.content)?;
                comments.update(&tx, &comment).await?;
                Ok(comment)
            })
            .await
    }

    pub async fn delete(&self, actor_id: &str, id: &str) -> AppResult<()> {
        let comments = self.comments.clone();
        let (actor_id, id) = (actor_id.to_string(), id.to_string());
        self.uow
            .transaction(|tx| async move {
                let comment = comments.find_by_id(&tx, &id).await?;
                if !comment.is_owned_by(&actor_id) {
                    return Err(AppError::Forbidden(format!("comment {} belongs to another user", id)));
                }
                comments.delete(&tx, &id).await
            })
            .await
    }
}
