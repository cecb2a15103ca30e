use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::services::errors::{AuthServiceError, GameError};

#[derive(Debug)]
pub enum ApiError {
    Game(GameError),
    AuthService(AuthServiceError),
    Unauthorized(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl From<GameError> for ApiError {
    fn from(error: GameError) -> Self {
        ApiError::Game(error)
    }
}

impl From<AuthServiceError> for ApiError {
    fn from(error: AuthServiceError) -> Self {
        ApiError::AuthService(error)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Game(error) => match error {
                GameError::NotFound(_) => StatusCode::NOT_FOUND,
                GameError::ValidationError(_) => StatusCode::BAD_REQUEST,
                GameError::Forbidden(_) | GameError::SessionMismatch => StatusCode::FORBIDDEN,
                GameError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
                GameError::InvalidState(_)
                | GameError::Capacity(_)
                | GameError::AlreadyUsed(_)
                | GameError::AlreadyFinished
                | GameError::NoPendingCheck
                | GameError::Conflict(_) => StatusCode::CONFLICT,
                GameError::Generation(_) => StatusCode::BAD_GATEWAY,
                GameError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::AuthService(AuthServiceError::InvalidToken | AuthServiceError::ExpiredToken) => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::AuthService(AuthServiceError::JwtError(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            ApiError::Game(GameError::Repository(_)) => ErrorBody {
                kind: "internal".to_string(),
                message: "Internal error".to_string(),
            },
            ApiError::Game(error) => ErrorBody {
                kind: error.kind().to_string(),
                message: error.to_string(),
            },
            ApiError::AuthService(error) => ErrorBody {
                kind: "unauthorized".to_string(),
                message: error.to_string(),
            },
            ApiError::Unauthorized(message) => ErrorBody {
                kind: "unauthorized".to_string(),
                message: message.clone(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
