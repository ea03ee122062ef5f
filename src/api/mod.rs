//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api`:
//! - User endpoints (register, login, profile)
//! - Blog endpoints
//! - Comment endpoints
//! - Ranking endpoint
//!
//! Write endpoints sit behind [`middleware::require_auth`]. `GET /health`
//! reports database reachability. Requests that outlive the configured
//! timeout are answered with `408 Request Timeout`.

pub mod blogs;
pub mod comments;
pub mod middleware;
pub mod rankings;
pub mod users;

use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Build the `/api` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let protected_routes = Router::new()
        .merge(users::protected_routes())
        .merge(blogs::protected_routes())
        .merge(comments::protected_routes())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    Router::new()
        .merge(users::public_routes())
        .merge(blogs::public_routes())
        .merge(comments::public_routes())
        .merge(rankings::public_routes())
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, server: &ServerConfig) -> anyhow::Result<Router> {
    let routes = Router::new()
        .route("/health", get(health))
        .nest("/api", build_api_router(state.clone()))
        .with_state(state);
    with_middleware(routes, &server.cors_origin, server.request_timeout())
}

/// Apply the HTTP middleware stack to `routes`
fn with_middleware(
    routes: Router,
    cors_origin: &str,
    request_timeout: Duration,
) -> anyhow::Result<Router> {
    let origin = if cors_origin == "*" {
        AllowOrigin::any()
    } else {
        let value = cors_origin
            .parse::<HeaderValue>()
            .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;
        AllowOrigin::exact(value)
    };
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Ok(routes
        .layer(cors)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http()))
}

async fn health(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .storage
        .write()
        .ping()
        .await
        .map_err(|e| ApiError::internal_error(format!("database unavailable: {}", e)))?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::{AuthConfig, ServerConfig};
    use crate::db::test_storage;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn app() -> (Router, AppState) {
        let state = AppState::new(
            test_storage().await,
            &AuthConfig::default(),
            SystemClock::shared(),
        );
        let server = ServerConfig {
            cors_origin: "*".to_string(),
            ..ServerConfig::default()
        };
        let router = build_router(state.clone(), &server).unwrap();
        (router, state)
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Register and log in; returns (user id, token)
    async fn sign_up(app: &Router, name: &str) -> (String, String) {
        let email = format!("{}@example.com", name);
        let (status, user) = send(
            app,
            "POST",
            "/api/users/register",
            None,
            Some(json!({ "username": name, "email": email, "password": "secret123" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, login) = send(
            app,
            "POST",
            "/api/users/login",
            None,
            Some(json!({ "email": email, "password": "secret123" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        (
            user["id"].as_str().unwrap().to_string(),
            login["token"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app().await;
        let (status, body) = send(&app, "GET", "/health", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_slow_request_times_out() {
        let slow = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "done"
            }),
        );
        let app = with_middleware(slow, "*", Duration::from_millis(20)).unwrap();

        let (status, _) = send(&app, "GET", "/slow", None, None).await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn test_invalid_cors_origin_rejected() {
        assert!(with_middleware(Router::new(), "bad\norigin", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_register_hides_password_and_rejects_duplicates() {
        let (app, _) = app().await;
        let body = json!({ "username": "amy", "email": "amy@example.com", "password": "pw" });

        let (status, user) = send(&app, "POST", "/api/users/register", None, Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(user.get("password_hash").is_none());

        let (status, err) = send(&app, "POST", "/api/users/register", None, Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_bad_login_is_unauthorized() {
        let (app, _) = app().await;
        sign_up(&app, "amy").await;

        let (status, _) = send(
            &app,
            "POST",
            "/api/users/login",
            None,
            Some(json!({ "email": "amy@example.com", "password": "wrong" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_write_routes_require_token() {
        let (app, _) = app().await;
        let blog = json!({ "title": "T", "content": "C" });

        let (status, _) = send(&app, "POST", "/api/blogs", None, Some(blog.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, "POST", "/api/blogs", Some("not-a-jwt"), Some(blog)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_blog_and_comment_flow() {
        let (app, _) = app().await;
        let (author_id, author) = sign_up(&app, "author").await;
        let (reader_id, reader) = sign_up(&app, "reader").await;

        let (status, blog) = send(
            &app,
            "POST",
            "/api/blogs",
            Some(&author),
            Some(json!({ "title": "Hello", "content": "World" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(blog["user_id"], author_id.as_str());
        let blog_id = blog["id"].as_str().unwrap();

        let (status, comment) = send(
            &app,
            "POST",
            &format!("/api/blogs/{}/comments", blog_id),
            Some(&reader),
            Some(json!({ "content": "Nice" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let comment_id = comment["id"].as_str().unwrap();

        let (status, fetched) = send(&app, "GET", &format!("/api/comments/{}", comment_id), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["content"], "Nice");

        let (status, mine) = send(&app, "GET", &format!("/api/users/{}/comments", reader_id), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(mine["comments"][0]["id"], comment_id);

        let (status, _) = send(&app, "GET", "/api/users/nobody/comments", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, list) = send(&app, "GET", &format!("/api/blogs/{}/comments", blog_id), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["comments"].as_array().unwrap().len(), 1);

        let (status, _) = send(
            &app,
            "PUT",
            &format!("/api/blogs/{}", blog_id),
            Some(&reader),
            Some(json!({ "title": "Mine now" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, page) = send(&app, "GET", "/api/blogs?page=0&per_page=5", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["blogs"].as_array().unwrap().len(), 1);
        assert_eq!(page["per_page"], 5);

        let (status, _) = send(&app, "DELETE", &format!("/api/blogs/{}", blog_id), Some(&author), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, err) = send(&app, "GET", &format!("/api/blogs/{}", blog_id), None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(err["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_users_may_only_edit_themselves() {
        let (app, _) = app().await;
        let (amy_id, _) = sign_up(&app, "amy").await;
        let (bob_id, bob) = sign_up(&app, "bob").await;

        let (status, _) = send(
            &app,
            "PUT",
            &format!("/api/users/{}", amy_id),
            Some(&bob),
            Some(json!({ "username": "hacked" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, user) = send(
            &app,
            "PUT",
            &format!("/api/users/{}", bob_id),
            Some(&bob),
            Some(json!({ "username": "robert" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(user["username"], "robert");
    }

    #[tokio::test]
    async fn test_rankings_endpoint() {
        let (app, state) = app().await;
        let (_, author) = sign_up(&app, "author").await;
        for title in ["quiet", "busy"] {
            let (_, blog) = send(
                &app,
                "POST",
                "/api/blogs",
                Some(&author),
                Some(json!({ "title": title, "content": "..." })),
            )
            .await;
            if title == "busy" {
                let uri = format!("/api/blogs/{}/comments", blog["id"].as_str().unwrap());
                send(&app, "POST", &uri, Some(&author), Some(json!({ "content": "+1" }))).await;
            }
        }

        let (_, empty) = send(&app, "GET", "/api/rankings", None, None).await;
        assert!(empty["rankings"].as_array().unwrap().is_empty());

        state.ranking_service.calculate_popular_ranking(7).await.unwrap();

        let (status, body) = send(&app, "GET", "/api/rankings?limit=1", None, None).await;
        assert_eq!(status, StatusCode::OK);
        let rankings = body["rankings"].as_array().unwrap();
        assert_eq!(rankings.len(), 1);
        assert_eq!(rankings[0]["position"], 1);
        assert_eq!(rankings[0]["score"], 1);

        let (status, _) = send(&app, "GET", "/api/rankings?limit=0", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
