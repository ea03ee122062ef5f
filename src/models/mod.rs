//! Data models
//!
//! Entities stored by the repositories and the inputs accepted by the services
//! and the HTTP layer.

mod blog;
mod comment;
mod ranking;
mod user;

pub use blog::{Blog, CreateBlogInput, PageParams, UpdateBlogInput, DEFAULT_PER_PAGE, MAX_PER_PAGE};
pub use comment::{Comment, CreateCommentInput, UpdateCommentInput};
pub use ranking::{BlogStat, Ranking};
pub use user::{LoginInput, RegisterUserInput, UpdateUserInput, User};
