//! HTTP error mapping for dropboard-server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dropboard_common::Error;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request that never reached the service (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Error raised by the service layer
    #[error(transparent)]
    Service(#[from] Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Service(err) => match err {
                Error::RoomNotFound(_) | Error::UserNotFound(_) => StatusCode::NOT_FOUND,
                Error::NotAMember { .. } | Error::NotRoomOwner { .. } => StatusCode::FORBIDDEN,
                Error::InvalidAnalysisInput { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
                Error::DuplicateUsername(_) => StatusCode::CONFLICT,
                Error::CapacityExhausted { .. } | Error::AnalysisUnavailable(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                Error::Config(_) | Error::Database(_) | Error::Io(_) | Error::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Service(err) => err.code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
