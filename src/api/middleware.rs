//! API middleware and shared handler types
//!
//! Contains:
//! - [`AppState`], the services every handler can reach
//! - [`ApiError`], the JSON error body and its status mapping
//! - [`require_auth`], Bearer JWT authentication

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::clock::DynClock;
use crate::config::AuthConfig;
use crate::db::queries::BlogStatsQuery;
use crate::db::repositories::{
    SqlxBlogRepository, SqlxCommentRepository, SqlxRankingRepository, SqlxUserRepository,
};
use crate::db::{Storage, UnitOfWork};
use crate::error::AppError;
use crate::services::{BlogService, CommentService, RankingService, TokenService, UserService};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub user_service: Arc<UserService>,
    pub blog_service: Arc<BlogService>,
    pub comment_service: Arc<CommentService>,
    pub ranking_service: Arc<RankingService>,
    pub tokens: Arc<TokenService>,
}

impl AppState {
    /// Wire repositories and services over `storage`
    pub fn new(storage: Storage, auth: &AuthConfig, clock: DynClock) -> Self {
        let uow = UnitOfWork::new(storage.clone());
        let users = SqlxUserRepository::boxed();
        let blogs = SqlxBlogRepository::boxed();
        let comments = SqlxCommentRepository::boxed();
        let tokens = TokenService::new(auth, clock.clone());

        Self {
            user_service: Arc::new(UserService::new(uow.clone(), users.clone(), tokens.clone())),
            blog_service: Arc::new(BlogService::new(uow.clone(), blogs.clone(), users.clone())),
            comment_service: Arc::new(CommentService::new(uow.clone(), comments, blogs, users)),
            ranking_service: Arc::new(RankingService::new(
                uow,
                Arc::new(BlogStatsQuery::new(clock.clone())),
                SqlxRankingRepository::boxed(clock.clone()),
                clock,
            )),
            tokens: Arc::new(tokens),
            storage,
        }
    }
}

/// Authenticated caller, inserted by [`require_auth`]
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "CONFLICT" | "ALREADY_LOCKED" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match &err {
            AppError::Transaction(_) | AppError::Infrastructure(_) => {
                tracing::error!("Request failed: {}", err);
                Self::new(err.code(), "Internal server error")
            }
            _ => Self::new(err.code(), err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

fn extract_bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&request)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;
    let claims = state.tokens.verify(token)?;

    request
        .extensions_mut()
        .insert(AuthenticatedUser { user_id: claims.sub });
    Ok(next.run(request).await)
}
