use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::error;

use crate::{
    error::ApiError,
    middleware::auth::{AuthenticatedUser, SessionToken},
    state::AppState,
};
use shared::models::game_match::SabotageEvent;
use shared::models::requests::{MechanismAnswerRequest, MechanismCastRequest, SabotageRequest};
use shared::models::views::{MechanismCheckIssued, MechanismCheckResult};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/matches/{match_id}/sabotage", post(cast_sabotage))
        .route("/matches/{match_id}/mechanism-check", post(cast_mechanism_check))
        .route(
            "/matches/{match_id}/mechanism-check/answer",
            post(answer_mechanism_check),
        )
        .route(
            "/matches/{match_id}/mechanism-check/sweep",
            post(sweep_expired_checks),
        )
}

async fn cast_sabotage(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    token: SessionToken,
    Path(match_id): Path<String>,
    Json(payload): Json<SabotageRequest>,
) -> Result<Json<SabotageEvent>, ApiError> {
    state
        .services
        .sabotage
        .cast_sabotage(
            &match_id,
            &user.identity,
            &payload.target_identity,
            payload.sabotage_type,
            token.as_deref(),
        )
        .await
        .map(Json)
        .map_err(|e| {
            error!("Sabotage by {} in match {} rejected: {}", user.identity, match_id, e);
            ApiError::from(e)
        })
}

async fn cast_mechanism_check(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    token: SessionToken,
    Path(match_id): Path<String>,
    Json(payload): Json<MechanismCastRequest>,
) -> Result<Json<MechanismCheckIssued>, ApiError> {
    state
        .services
        .sabotage
        .cast_mechanism_check(&match_id, &user.identity, &payload.target_identity, token.as_deref())
        .await
        .map(Json)
        .map_err(|e| {
            error!("Mechanism check by {} in match {} rejected: {}", user.identity, match_id, e);
            ApiError::from(e)
        })
}

async fn answer_mechanism_check(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    token: SessionToken,
    Path(match_id): Path<String>,
    Json(payload): Json<MechanismAnswerRequest>,
) -> Result<Json<MechanismCheckResult>, ApiError> {
    state
        .services
        .sabotage
        .answer_mechanism_check(&match_id, &user.identity, &payload.answers, token.as_deref())
        .await
        .map(Json)
        .map_err(ApiError::from)
}

async fn sweep_expired_checks(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(match_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let expired = state
        .services
        .sabotage
        .sweep_expired_checks(&match_id)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(json!({ "expired": expired })))
}
