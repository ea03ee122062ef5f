//! myblog - A layered blog backend
//!
//! Users, blogs and comments over SQLite or MySQL, plus a batch job that
//! recomputes the popular-blog ranking under an exclusive lock.

pub mod api;
pub mod batch;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod lock;
pub mod models;
pub mod services;
