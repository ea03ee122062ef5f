//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Comment entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: String,
    pub blog_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(blog_id: String, user_id: String, content: String) -> AppResult<Self> {
        validate_content(&content)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            blog_id,
            user_id,
            content,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn update_content(&mut self, content: String) -> AppResult<()> {
        validate_content(&content)?;
        self.content = content;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

fn validate_content(content: &str) -> AppResult<()> {
    if content.trim().is_empty() {
        return Err(AppError::validation("comment must not be empty"));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommentInput {
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCommentInput {
    pub content: String,
}
