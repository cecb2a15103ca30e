use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{error::ApiError, state::AppState};

/// Header carrying the per-seat session token issued at join time.
pub const SESSION_TOKEN_HEADER: &str = "x-session-token";

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub identity: String,
    pub display_name: String,
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?
            .to_str()
            .map_err(|_| ApiError::Unauthorized("Invalid header format".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("Expected a Bearer token".to_string()))?;

        let identity = state.auth_service.verify_token(token)?;
        Ok(AuthenticatedUser {
            identity: identity.identity,
            display_name: identity.display_name,
        })
    }
}

/// Session token presented with the request, if any.
#[derive(Debug, Clone, Default)]
pub struct SessionToken(pub Option<String>);

impl SessionToken {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(SESSION_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        Ok(SessionToken(token))
    }
}
