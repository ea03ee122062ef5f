//! Blog API endpoints
//!
//! - GET /api/blogs?page=&per_page=
//! - GET /api/blogs/{id}
//! - POST /api/blogs (auth)
//! - PUT /api/blogs/{id} (author only)
//! - DELETE /api/blogs/{id} (author only)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Blog, CreateBlogInput, PageParams, UpdateBlogInput};

/// Response for blog lists
#[derive(Debug, Serialize)]
pub struct BlogListResponse {
    pub blogs: Vec<Blog>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<i64>,
}

impl BlogListResponse {
    pub fn new(blogs: Vec<Blog>, params: Option<PageParams>) -> Self {
        Self {
            blogs,
            page: params.map(|p| p.page),
            per_page: params.map(|p| p.limit()),
        }
    }
}

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/blogs", get(list_blogs))
        .route("/blogs/{id}", get(get_blog))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/blogs", post(create_blog))
        .route("/blogs/{id}", put(update_blog).delete(delete_blog))
}

async fn list_blogs(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<BlogListResponse>, ApiError> {
    let blogs = state.blog_service.list(params).await?;
    Ok(Json(BlogListResponse::new(blogs, Some(params))))
}

async fn get_blog(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Blog>, ApiError> {
    Ok(Json(state.blog_service.get(&id).await?))
}

async fn create_blog(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Json(input): Json<CreateBlogInput>,
) -> Result<(StatusCode, Json<Blog>), ApiError> {
    let blog = state.blog_service.create(&caller.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(blog)))
}

async fn update_blog(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    Json(input): Json<UpdateBlogInput>,
) -> Result<Json<Blog>, ApiError> {
    Ok(Json(state.blog_service.update(&caller.user_id, &id, input).await?))
}

async fn delete_blog(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.blog_service.delete(&caller.user_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
