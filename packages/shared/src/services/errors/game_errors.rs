use crate::repositories::errors::RepositoryError;
use crate::services::errors::case_generator_errors::GenerationError;

/// Every failure a player-facing operation can surface. `kind()` is the
/// stable, machine-checkable name clients branch on.
#[derive(Debug, Clone, PartialEq)]
pub enum GameError {
    NotFound(String),
    InvalidState(String),
    Forbidden(String),
    SessionMismatch,
    Capacity(String),
    AlreadyUsed(String),
    RateLimited(String),
    ValidationError(String),
    AlreadyFinished,
    NoPendingCheck,
    Generation(GenerationError),
    /// Optimistic update retries exhausted.
    Conflict(String),
    Repository(RepositoryError),
}

impl GameError {
    pub fn kind(&self) -> &'static str {
        match self {
            GameError::NotFound(_) => "not_found",
            GameError::InvalidState(_) => "invalid_state",
            GameError::Forbidden(_) => "forbidden",
            GameError::SessionMismatch => "session_mismatch",
            GameError::Capacity(_) => "capacity",
            GameError::AlreadyUsed(_) => "already_used",
            GameError::RateLimited(_) => "rate_limited",
            GameError::ValidationError(_) => "validation_error",
            GameError::AlreadyFinished => "already_finished",
            GameError::NoPendingCheck => "no_pending_check",
            GameError::Generation(_) => "generation_failed",
            GameError::Conflict(_) => "conflict",
            GameError::Repository(_) => "internal",
        }
    }
}

impl std::fmt::Display for GameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameError::NotFound(what) => write!(f, "{} not found", what),
            GameError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            GameError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            GameError::SessionMismatch => {
                write!(f, "Session token does not match the active session")
            }
            GameError::Capacity(msg) => write!(f, "Capacity reached: {}", msg),
            GameError::AlreadyUsed(msg) => write!(f, "Already used: {}", msg),
            GameError::RateLimited(msg) => write!(f, "Rate limited: {}", msg),
            GameError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            GameError::AlreadyFinished => write!(f, "Player has already finished"),
            GameError::NoPendingCheck => write!(f, "No pending mechanism check"),
            GameError::Generation(err) => write!(f, "Case generation failed: {}", err),
            GameError::Conflict(msg) => write!(f, "Concurrent update conflict: {}", msg),
            GameError::Repository(err) => write!(f, "Repository error: {}", err),
        }
    }
}

impl std::error::Error for GameError {}

impl From<RepositoryError> for GameError {
    fn from(err: RepositoryError) -> Self {
        GameError::Repository(err)
    }
}

impl From<GenerationError> for GameError {
    fn from(err: GenerationError) -> Self {
        GameError::Generation(err)
    }
}
