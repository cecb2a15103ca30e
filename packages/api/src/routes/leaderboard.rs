use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};

use crate::{error::ApiError, state::AppState};
use shared::models::requests::LeaderboardQuery;
use shared::models::views::LeaderboardEntry;

pub fn routes() -> Router<AppState> {
    Router::new().route("/leaderboard", get(leaderboard))
}

/// Public: only aliases are exposed.
async fn leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    state
        .services
        .ranked
        .leaderboard(query.limit)
        .await
        .map(Json)
        .map_err(ApiError::from)
}
