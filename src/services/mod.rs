//! Services layer - Business logic
//!
//! Services implement the use cases of myblog on top of the repositories.
//! They are responsible for:
//! - Enforcing validation and ownership rules
//! - Grouping repository calls into units of work
//! - Mapping missing or conflicting data to typed errors

pub mod blog;
pub mod comment;
pub mod password;
pub mod ranking;
pub mod token;
pub mod user;

pub use blog::BlogService;
pub use comment::CommentService;
pub use password::{hash_password, verify_password};
pub use ranking::{RankingService, DEFAULT_RANKING_LIMIT};
pub use token::{Claims, TokenService};
pub use user::{LoginResponse, UserService};
