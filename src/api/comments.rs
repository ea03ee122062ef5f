//! Comment API endpoints
//!
//! - GET /api/blogs/{id}/comments
//! - GET /api/users/{id}/comments
//! - GET /api/comments/{id}
//! - POST /api/blogs/{id}/comments (auth)
//! - PUT /api/comments/{id} (author only)
//! - DELETE /api/comments/{id} (author only)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Comment, CreateCommentInput, UpdateCommentInput};

#[derive(Debug, Serialize)]
pub struct CommentListResponse {
    pub comments: Vec<Comment>,
}

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/blogs/{id}/comments", get(list_blog_comments))
        .route("/users/{id}/comments", get(list_user_comments))
        .route("/comments/{id}", get(get_comment))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/blogs/{id}/comments", post(create_comment))
        .route("/comments/{id}", put(update_comment).delete(delete_comment))
}

async fn list_blog_comments(
    State(state): State<AppState>,
    Path(blog_id): Path<String>,
) -> Result<Json<CommentListResponse>, ApiError> {
    let comments = state.comment_service.list_by_blog(&blog_id).await?;
    Ok(Json(CommentListResponse { comments }))
}

async fn list_user_comments(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<CommentListResponse>, ApiError> {
    let comments = state.comment_service.list_by_user(&user_id).await?;
    Ok(Json(CommentListResponse { comments }))
}

async fn get_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Comment>, ApiError> {
    Ok(Json(state.comment_service.get(&id).await?))
}

async fn create_comment(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(blog_id): Path<String>,
    Json(input): Json<CreateCommentInput>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let comment = state
        .comment_service
        .create(&blog_id, &caller.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn update_comment(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    Json(input): Json<UpdateCommentInput>,
) -> Result<Json<Comment>, ApiError> {
    Ok(Json(state.comment_service.update(&caller.user_id, &id, input).await?))
}

async fn delete_comment(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.comment_service.delete(&caller.user_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
