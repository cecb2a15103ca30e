use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{debug, error, warn};

use crate::{error::ApiError, middleware::auth::AuthenticatedUser, state::AppState};
use shared::models::views::QueueView;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/queue/join", post(join_queue))
        .route("/queue/leave", post(leave_queue))
        .route("/queue/status", get(queue_status))
}

async fn join_queue(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<QueueView>, ApiError> {
    let matchmaking = &state.services.matchmaking;
    let view = matchmaking.join_queue(&user.identity).await.map_err(|e| {
        error!("Failed to join queue for {}: {}", user.identity, e);
        ApiError::from(e)
    })?;
    debug!("{} is {:?} in the ranked queue", user.identity, view.status);

    if !state.pair_inline {
        return Ok(Json(view));
    }
    match matchmaking.find_and_match_opponent(&user.identity).await {
        Ok(Some(_)) => Ok(Json(matchmaking.queue_status(&user.identity).await?)),
        Ok(None) => Ok(Json(view)),
        Err(e) => {
            warn!("Inline pairing for {} failed: {}", user.identity, e);
            Ok(Json(view))
        }
    }
}

async fn leave_queue(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<StatusCode, ApiError> {
    state
        .services
        .matchmaking
        .leave_queue(&user.identity)
        .await
        .map_err(|e| {
            error!("Failed to leave queue for {}: {}", user.identity, e);
            ApiError::from(e)
        })?;
    debug!("{} left the ranked queue", user.identity);
    Ok(StatusCode::NO_CONTENT)
}

async fn queue_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<QueueView>, ApiError> {
    state
        .services
        .matchmaking
        .queue_status(&user.identity)
        .await
        .map(Json)
        .map_err(ApiError::from)
}
