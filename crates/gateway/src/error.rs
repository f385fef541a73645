//! Error types for the gateway layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Gateway error types
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::DatabaseError(_) | GatewayError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = json!({
            "error": status.as_str(),
            "message": self.to_string(),
        });

        (status, Json(error_response)).into_response()
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<courier_database::UserError> for GatewayError {
    fn from(error: courier_database::UserError) -> Self {
        match error {
            courier_database::UserError::UserNotFound => {
                GatewayError::NotFound("User not found".to_string())
            }
            courier_database::UserError::ValidationError(msg) => GatewayError::InvalidRequest(msg),
            courier_database::UserError::DatabaseError(msg) => GatewayError::DatabaseError(msg),
        }
    }
}

impl From<courier_database::MessagingError> for GatewayError {
    fn from(error: courier_database::MessagingError) -> Self {
        match error {
            // Absent conversations surface as empty results in the service
            // layer; a NotFound reaching this point is unexpected state
            courier_database::MessagingError::RoomNotFound => {
                GatewayError::NotFound("Room not found".to_string())
            }
            courier_database::MessagingError::MessageNotFound => {
                GatewayError::NotFound("Message not found".to_string())
            }
            courier_database::MessagingError::ValidationError(msg) => {
                GatewayError::InvalidRequest(msg)
            }
            courier_database::MessagingError::DatabaseError(msg) => {
                GatewayError::DatabaseError(msg)
            }
        }
    }
}
