use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use embuddy_core::BuddyError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Server-specific error types.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid request body: {0}")]
    BadRequest(String),

    #[error("{0}")]
    CoreError(#[from] BuddyError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            ServerError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "session_not_found"),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ServerError::CoreError(core_err) => {
                let status = match core_err {
                    BuddyError::Format { .. }
                    | BuddyError::Schema(_)
                    | BuddyError::Encoding(_)
                    | BuddyError::MappingExhausted => StatusCode::UNPROCESSABLE_ENTITY,
                    BuddyError::InvalidInput(_) | BuddyError::Configuration(_) => StatusCode::BAD_REQUEST,
                    BuddyError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                    BuddyError::StaleGeneration { .. } => StatusCode::CONFLICT,
                    BuddyError::Collaborator(_) => StatusCode::BAD_GATEWAY,
                    BuddyError::Internal(msg) => {
                        error!(error = %msg, "Core internal error");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, core_err.kind())
            }
        };

        warn!(status = %status, kind, error = %self, "Responding with error");

        let body = Json(json!({
            "error": self.to_string(),
            "kind": kind,
        }));
        (status, body).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
