//! Battle Error Types
//!
//! Battle-specific error variants that integrate with the unified
//! `kernel::error::AppError` system.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Battle-specific result type alias
pub type BattleResult<T> = Result<T, BattleError>;

/// Battle-specific error variants
#[derive(Debug, Error)]
pub enum BattleError {
    // ------------------------------------------------------------------
    // Join time
    // ------------------------------------------------------------------
    #[error("Room not found")]
    RoomNotFound,

    #[error("Room is not accepting new participants")]
    RoomNotJoinable,

    #[error("Room is full")]
    RoomFull,

    #[error("Display name is already taken in this room")]
    DuplicateDisplayName,

    #[error("Invalid display name: {0}")]
    InvalidDisplayName(String),

    // ------------------------------------------------------------------
    // Submission time
    // ------------------------------------------------------------------
    #[error("Room is not active")]
    RoomNotActive,

    #[error("Question {submitted} is no longer open (current question is {current})")]
    StaleQuestion { submitted: u32, current: u32 },

    #[error("Question already answered")]
    DuplicateAnswer,

    #[error("Question id does not match the question at this index")]
    QuestionMismatch,

    #[error("Participant not found")]
    ParticipantNotFound,

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Invalid room configuration: {0}")]
    InvalidConfig(String),

    // ------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------
    #[error("No free room code available")]
    CodeSpaceExhausted,

    /// Insert lost the race for a room code; retried by the registry
    #[error("Room code already taken")]
    CodeTaken,

    // ------------------------------------------------------------------
    // Access
    // ------------------------------------------------------------------
    #[error("Missing or invalid token")]
    Unauthorized,

    #[error("Token does not grant access to this resource")]
    Forbidden,

    // ------------------------------------------------------------------
    // Quiz catalog
    // ------------------------------------------------------------------
    #[error("Quiz not found: {0}")]
    QuizNotFound(String),

    #[error("Quiz catalog error: {0}")]
    Catalog(String),

    // ------------------------------------------------------------------
    // Infrastructure
    // ------------------------------------------------------------------
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BattleError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            BattleError::RoomNotFound
            | BattleError::ParticipantNotFound
            | BattleError::QuizNotFound(_) => StatusCode::NOT_FOUND,
            BattleError::RoomNotJoinable
            | BattleError::RoomFull
            | BattleError::DuplicateDisplayName
            | BattleError::RoomNotActive
            | BattleError::StaleQuestion { .. }
            | BattleError::DuplicateAnswer
            | BattleError::InvalidTransition(_) => StatusCode::CONFLICT,
            BattleError::InvalidDisplayName(_)
            | BattleError::QuestionMismatch
            | BattleError::InvalidConfig(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BattleError::Unauthorized => StatusCode::UNAUTHORIZED,
            BattleError::Forbidden => StatusCode::FORBIDDEN,
            BattleError::CodeSpaceExhausted => StatusCode::SERVICE_UNAVAILABLE,
            BattleError::Catalog(_) => StatusCode::BAD_GATEWAY,
            BattleError::CodeTaken | BattleError::Database(_) | BattleError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            BattleError::RoomNotFound
            | BattleError::ParticipantNotFound
            | BattleError::QuizNotFound(_) => ErrorKind::NotFound,
            BattleError::RoomNotJoinable
            | BattleError::RoomFull
            | BattleError::DuplicateDisplayName
            | BattleError::RoomNotActive
            | BattleError::StaleQuestion { .. }
            | BattleError::DuplicateAnswer
            | BattleError::InvalidTransition(_) => ErrorKind::Conflict,
            BattleError::InvalidDisplayName(_)
            | BattleError::QuestionMismatch
            | BattleError::InvalidConfig(_) => ErrorKind::UnprocessableEntity,
            BattleError::Unauthorized => ErrorKind::Unauthorized,
            BattleError::Forbidden => ErrorKind::Forbidden,
            BattleError::CodeSpaceExhausted => ErrorKind::ServiceUnavailable,
            BattleError::Catalog(_) => ErrorKind::BadGateway,
            BattleError::CodeTaken | BattleError::Database(_) | BattleError::Internal(_) => {
                ErrorKind::InternalServerError
            }
        }
    }

    /// Hint for the client render layer
    fn action(&self) -> Option<&'static str> {
        match self {
            BattleError::RoomFull => Some("Ask the host for another room"),
            BattleError::DuplicateDisplayName => Some("Choose a different display name"),
            BattleError::RoomNotJoinable => Some("Wait for the next battle"),
            BattleError::CodeSpaceExhausted => Some("Try again in a few minutes"),
            _ => None,
        }
    }

    /// Convert to AppError
    pub fn to_app_error(&self) -> AppError {
        // Never echo database or internal details to clients.
        let message = match self {
            BattleError::Database(_) | BattleError::Internal(_) | BattleError::CodeTaken => {
                self.kind().as_str().to_string()
            }
            _ => self.to_string(),
        };
        let err = AppError::new(self.kind(), message);
        match self.action() {
            Some(action) => err.with_action(action),
            None => err,
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            BattleError::Database(e) => {
                tracing::error!(error = %e, "Battle database error");
            }
            BattleError::Internal(msg) => {
                tracing::error!(message = %msg, "Battle internal error");
            }
            BattleError::Catalog(msg) => {
                tracing::error!(message = %msg, "Quiz catalog error");
            }
            BattleError::CodeSpaceExhausted => {
                tracing::warn!("Room code space exhausted");
            }
            BattleError::RoomFull | BattleError::DuplicateDisplayName => {
                tracing::warn!(error = %self, "Join rejected");
            }
            _ => {
                tracing::debug!(error = %self, "Battle error");
            }
        }
    }
}

impl IntoResponse for BattleError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}

impl From<platform::token::TokenError> for BattleError {
    fn from(_: platform::token::TokenError) -> Self {
        BattleError::Unauthorized
    }
}

impl From<serde_json::Error> for BattleError {
    fn from(err: serde_json::Error) -> Self {
        BattleError::Internal(format!("snapshot encoding: {err}"))
    }
}
