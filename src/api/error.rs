use axum::{Json, http::StatusCode, response::IntoResponse};
use thiserror::Error;

use super::models::ErrorResponse;
use crate::error::AcquireError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("invalid media reference: {0}")]
    InvalidReference(String),
    #[error("credential refresh failed")]
    RefreshFailed,
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidParameter(_) | ApiError::InvalidReference(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::RefreshFailed => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidParameter(_) => "INVALID_PARAMETER",
            ApiError::InvalidReference(_) => "INVALID_REFERENCE",
            ApiError::RefreshFailed => "REFRESH_FAILED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<AcquireError> for ApiError {
    fn from(value: AcquireError) -> Self {
        match value {
            AcquireError::InvalidReference(raw) => ApiError::InvalidReference(raw),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
