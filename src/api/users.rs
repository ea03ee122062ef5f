//! User API endpoints
//!
//! - POST /api/users/register
//! - POST /api/users/login
//! - GET /api/users/{id}
//! - GET /api/users/{id}/blogs
//! - PUT /api/users/{id} (self only)
//! - DELETE /api/users/{id} (self only)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};

use crate::api::blogs::BlogListResponse;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{LoginInput, RegisterUserInput, UpdateUserInput, User};
use crate::services::LoginResponse;

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/{id}", get(get_user))
        .route("/users/{id}/blogs", get(list_user_blogs))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/users/{id}", put(update_user).delete(delete_user))
}

async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterUserInput>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state.user_service.register(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> Result<Json<LoginResponse>, ApiError> {
    Ok(Json(state.user_service.login(input).await?))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.user_service.get(&id).await?))
}

async fn list_user_blogs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BlogListResponse>, ApiError> {
    let blogs = state.blog_service.list_by_user(&id).await?;
    Ok(Json(BlogListResponse::new(blogs, None)))
}

async fn update_user(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    Json(input): Json<UpdateUserInput>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.user_service.update(&caller.user_id, &id, input).await?))
}

async fn delete_user(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.user_service.delete(&caller.user_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
