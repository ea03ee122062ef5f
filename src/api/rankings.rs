//! Ranking API endpoint
//!
//! - GET /api/rankings?limit= - the current generation, best first

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState};
use crate::models::Ranking;
use crate::services::DEFAULT_RANKING_LIMIT;

#[derive(Debug, Deserialize)]
pub struct RankingQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_RANKING_LIMIT
}

#[derive(Debug, Serialize)]
pub struct RankingListResponse {
    pub rankings: Vec<Ranking>,
}

pub fn public_routes() -> Router<AppState> {
    Router::new().route("/rankings", get(list_rankings))
}

async fn list_rankings(
    State(state): State<AppState>,
    Query(query): Query<RankingQuery>,
) -> Result<Json<RankingListResponse>, ApiError> {
    let rankings = state.ranking_service.get_rankings(query.limit).await?;
    Ok(Json(RankingListResponse { rankings }))
}
