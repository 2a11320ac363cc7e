//! Response envelope for the HTTP API
//!
//! Every API reply carries the same envelope: the operation name, a
//! success flag, a human-readable message, and an optional data payload.
//! Clients poll rather than receive pushes, so the envelope is the whole
//! conversation.

use crate::error::MatchmakingError;
use axum::http::StatusCode;
use serde::Serialize;

/// Uniform reply shape for every API operation
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Name of the operation that was requested
    pub request: &'static str,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(request: &'static str, message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            request,
            success: true,
            message: message.into(),
            data,
        }
    }

    pub fn failure(request: &'static str, message: impl Into<String>) -> Self {
        Self {
            request,
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

/// Map an engine error to an HTTP status.
///
/// NotFound-class errors are 404, Conflict-class errors are 409, anything
/// else is a 500. None of these are fatal to the service.
pub fn error_status(error: &anyhow::Error) -> StatusCode {
    match error.downcast_ref::<MatchmakingError>() {
        Some(MatchmakingError::SessionNotFound { .. })
        | Some(MatchmakingError::MatchNotFound { .. }) => StatusCode::NOT_FOUND,
        Some(MatchmakingError::AlreadyQueued { .. })
        | Some(MatchmakingError::NotInQueue { .. })
        | Some(MatchmakingError::SessionBusy { .. })
        | Some(MatchmakingError::InvalidMatchTransition { .. }) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
