//! JSON error response helpers.

use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;

use crate::chat::ChatError;
use crate::session::ActorError;

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub fn not_found(message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    error_response(StatusCode::NOT_FOUND, message)
}

pub fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    error_response(StatusCode::BAD_REQUEST, message)
}

pub fn conflict(message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    error_response(StatusCode::CONFLICT, message)
}

pub fn internal_error(message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, message)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

/// Map a chat error to its HTTP representation.
pub fn from_chat_error(err: &ChatError) -> (StatusCode, Json<ErrorBody>) {
    match err {
        ChatError::SessionNotFound(_) => not_found(err.to_string()),
        ChatError::InvalidMessage(_) => bad_request(err.to_string()),
        ChatError::Actor(ActorError::InvalidTransition(_)) => conflict(err.to_string()),
        ChatError::Actor(_) | ChatError::Match(_) => internal_error(err.to_string()),
    }
}
