//! Error types for the admin surface

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use hubbub_broker::{message, BrokerError, ErrorBody};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// Error response body: the protocol error object plus a server timestamp.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub timestamp: String,
}

impl AdminError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AdminError::Broker(err) => match err {
                BrokerError::TopicExists => StatusCode::CONFLICT,
                BrokerError::TopicNotFound => StatusCode::NOT_FOUND,
                BrokerError::BadRequest(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AdminError::Broker(err) => err.code(),
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code().to_string(),
                message: self.to_string(),
            },
            timestamp: message::timestamp(),
        };

        tracing::warn!(status = %status, error = %self, "admin request failed");
        (status, Json(body)).into_response()
    }
}

/// Result type alias for admin handlers.
pub type Result<T> = std::result::Result<T, AdminError>;
