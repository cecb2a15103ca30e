use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{debug, error};

use crate::{
    error::ApiError,
    middleware::auth::{AuthenticatedUser, SessionToken},
    state::AppState,
};
use shared::models::views::SessionSnapshot;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/session", get(resolve_session))
        .route("/session/disconnect", post(disconnect))
}

async fn resolve_session(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    token: SessionToken,
) -> Result<Json<SessionSnapshot>, ApiError> {
    state
        .services
        .reconnection
        .resolve_session(&user.identity, token.as_deref())
        .await
        .map(Json)
        .map_err(|e| {
            error!("Could not resolve session for {}: {}", user.identity, e);
            ApiError::from(e)
        })
}

async fn disconnect(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<StatusCode, ApiError> {
    state
        .services
        .reconnection
        .mark_disconnected(&user.identity)
        .await
        .map_err(ApiError::from)?;
    debug!("{} marked disconnected", user.identity);
    Ok(StatusCode::NO_CONTENT)
}
