//! API error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use treesync_engine::EngineError;

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Error raised by the engine.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Engine(e) => match e {
                EngineError::NotFound(_) => StatusCode::NOT_FOUND,
                EngineError::AlreadyRunning(_) | EngineError::Disabled(_) => StatusCode::CONFLICT,
                EngineError::InvalidSchedule { .. } | EngineError::InvalidJob(_) => {
                    StatusCode::BAD_REQUEST
                }
                EngineError::Detection(_)
                | EngineError::InvalidSettings(_)
                | EngineError::InstanceLocked { .. }
                | EngineError::Persistence(_)
                | EngineError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}
