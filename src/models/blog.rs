//! Blog model
//!
//! This module provides:
//! - `Blog` entity
//! - Input types for creating and updating blogs
//! - `PageParams` for paginated listing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Blog entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Blog {
    /// UUID string
    pub id: String,
    /// Author user ID
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Blog {
    pub fn new(user_id: String, title: String, content: String) -> AppResult<Self> {
        validate_title(&title)?;
        validate_content(&content)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            title,
            content,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a partial update and bump `updated_at`
    pub fn apply(&mut self, input: UpdateBlogInput) -> AppResult<()> {
        if let Some(title) = input.title {
            validate_title(&title)?;
            self.title = title;
        }
        if let Some(content) = input.content {
            validate_content(&content)?;
            self.content = content;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

fn validate_title(title: &str) -> AppResult<()> {
    if title.trim().is_empty() {
        return Err(AppError::validation("title must not be empty"));
    }
    Ok(())
}

fn validate_content(content: &str) -> AppResult<()> {
    if content.trim().is_empty() {
        return Err(AppError::validation("content must not be empty"));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBlogInput {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBlogInput {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// Pagination parameters for blog listing (0-based pages)
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

pub const DEFAULT_PER_PAGE: u32 = 10;
pub const MAX_PER_PAGE: u32 = 100;

fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: 0,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PageParams {
    /// `per_page` clamped to `1..=MAX_PER_PAGE`
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page.clamp(1, MAX_PER_PAGE))
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page) * self.limit()
    }
}
