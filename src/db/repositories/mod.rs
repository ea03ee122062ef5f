//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles CRUD operations for a specific entity and takes a
//! [`DbHandle`](crate::db::DbHandle) as the first argument of every method.

pub mod blog;
pub mod comment;
pub mod ranking;
pub mod user;

pub use blog::{BlogRepository, SqlxBlogRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use ranking::{RankingRepository, SqlxRankingRepository};
pub use user::{SqlxUserRepository, UserRepository};
