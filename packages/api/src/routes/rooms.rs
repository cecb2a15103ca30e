use axum::{
    extract::{Path, State},
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
use shared::models::requests::{CreateRoomRequest, JoinRoomRequest};
use shared::models::views::{JoinOutcome, MatchView, RoomView};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/join", post(join_room))
        .route("/rooms/{room_id}", get(get_room))
        .route("/rooms/{room_id}/ready", post(toggle_ready))
        .route("/rooms/{room_id}/leave", post(leave_room))
        .route("/rooms/{room_id}/start", post(start_match))
        .route("/rooms/{room_id}/abort", post(abort_room))
}

async fn create_room(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<JoinOutcome>), ApiError> {
    let outcome = state
        .services
        .lobby
        .create_room(&user.identity, &user.display_name, payload.settings)
        .await
        .map_err(|e| {
            error!("Failed to create room for {}: {}", user.identity, e);
            ApiError::from(e)
        })?;
    debug!("Room {} created by {}", outcome.room_key, user.identity);
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn join_room(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    token: SessionToken,
    Json(payload): Json<JoinRoomRequest>,
) -> Result<Json<JoinOutcome>, ApiError> {
    state
        .services
        .lobby
        .join_room(&payload.room_key, &user.identity, &user.display_name, token.as_deref())
        .await
        .map(Json)
        .map_err(|e| {
            error!("{} could not join room {}: {}", user.identity, payload.room_key, e);
            ApiError::from(e)
        })
}

async fn get_room(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(room_id): Path<String>,
) -> Result<Json<RoomView>, ApiError> {
    state
        .services
        .lobby
        .get_room_view(&room_id, &user.identity)
        .await
        .map(Json)
        .map_err(ApiError::from)
}

async fn toggle_ready(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    token: SessionToken,
    Path(room_id): Path<String>,
) -> Result<Json<RoomView>, ApiError> {
    state
        .services
        .lobby
        .toggle_ready(&room_id, &user.identity, token.as_deref())
        .await
        .map(Json)
        .map_err(|e| {
            error!("{} could not toggle ready in {}: {}", user.identity, room_id, e);
            ApiError::from(e)
        })
}

async fn leave_room(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(room_id): Path<String>,
) -> Result<Json<RoomView>, ApiError> {
    state
        .services
        .lobby
        .leave_room(&room_id, &user.identity)
        .await
        .map(Json)
        .map_err(|e| {
            error!("{} could not leave room {}: {}", user.identity, room_id, e);
            ApiError::from(e)
        })
}

async fn start_match(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(room_id): Path<String>,
) -> Result<(StatusCode, Json<MatchView>), ApiError> {
    let view = state
        .services
        .lobby
        .start_match(&room_id, &user.identity)
        .await
        .map_err(|e| {
            error!("{} could not start a match in {}: {}", user.identity, room_id, e);
            ApiError::from(e)
        })?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn abort_room(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(room_id): Path<String>,
) -> Result<Json<RoomView>, ApiError> {
    state
        .services
        .lobby
        .abort_room(&room_id, &user.identity)
        .await
        .map(Json)
        .map_err(|e| {
            error!("{} could not abort room {}: {}", user.identity, room_id, e);
            ApiError::from(e)
        })
}
