//! Read-only queries that span several tables

pub mod blog_stats;

pub use blog_stats::{BlogStatsQuery, CommentCountPolicy, ScorePolicy};
