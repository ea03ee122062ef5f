//! Ranking model
//!
//! One `Ranking` row per blog in the current generation. A generation is
//! always written as a whole: positions run from 1 to N without gaps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A ranked blog in the current generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Ranking {
    pub blog_id: String,
    /// 1-based, unique within a generation
    #[sqlx(rename = "ranking_position")]
    pub position: i32,
    pub score: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ranking {
    pub fn new(blog_id: String, position: i32, score: i64, now: DateTime<Utc>) -> Self {
        Self {
            blog_id,
            position,
            score,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Per-blog statistics returned by the aggregation query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogStat {
    pub blog_id: String,
    /// Comments created inside the window
    pub comment_count: i64,
    pub score: i64,
}
