use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{debug, error};

use crate::{
    error::ApiError,
    middleware::auth::{AuthenticatedUser, SessionToken},
    state::AppState,
};
use shared::models::requests::GuessRequest;
use shared::models::views::{GuessOutcome, MatchView};
use shared::services::errors::GameError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/matches/{match_id}", get(get_match))
        .route("/matches/{match_id}/guess", post(submit_guess))
        .route("/matches/{match_id}/generation", post(retry_generation))
        .route("/history", get(match_history))
}

async fn get_match(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    token: SessionToken,
    Path(match_id): Path<String>,
) -> Result<Json<MatchView>, ApiError> {
    state
        .services
        .matches
        .get_match_view(&match_id, &user.identity, token.as_deref())
        .await
        .map(Json)
        .map_err(ApiError::from)
}

async fn submit_guess(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    token: SessionToken,
    Path(match_id): Path<String>,
    Json(payload): Json<GuessRequest>,
) -> Result<Json<GuessOutcome>, ApiError> {
    payload.validate().map_err(GameError::ValidationError)?;
    let outcome = state
        .services
        .matches
        .submit_guess(&match_id, &user.identity, &payload.guess, token.as_deref())
        .await
        .map_err(|e| {
            error!("Guess by {} in match {} rejected: {}", user.identity, match_id, e);
            ApiError::from(e)
        })?;
    debug!("{} guessed in match {}: correct={}", user.identity, match_id, outcome.correct);
    Ok(Json(outcome))
}

async fn retry_generation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(match_id): Path<String>,
) -> Result<Json<MatchView>, ApiError> {
    state
        .services
        .matches
        .retry_generation(&match_id, &user.identity)
        .await
        .map(Json)
        .map_err(|e| {
            error!("Generation retry for match {} failed: {}", match_id, e);
            ApiError::from(e)
        })
}

async fn match_history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<MatchView>>, ApiError> {
    state
        .services
        .matches
        .match_history(&user.identity)
        .await
        .map(Json)
        .map_err(ApiError::from)
}
