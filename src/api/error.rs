//! API error types with JSON `{error}` responses.
//!
//! Every failure leaving the HTTP layer goes through `ApiError`, so clients
//! always receive a JSON object with a human-readable `error` string.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::imaging::ImagingError;
use crate::pipeline::ProcessError;
use crate::storage::StorageError;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid CAPTCHA answer")]
    InvalidCaptcha,
    #[error("No image file selected")]
    MissingFile,
    #[error("Unsupported file format")]
    UnsupportedFormat,
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("{message}")]
    Upload { status: StatusCode, message: String },
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidCaptcha | ApiError::MissingFile | ApiError::UnsupportedFormat => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upload { status, .. } => *status,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Internal(detail) => tracing::error!(detail, "Request failed"),
            other => tracing::debug!(error = %other, status = status.as_u16(), "Request rejected"),
        }

        // Internal messages pass through verbatim
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ProcessError> for ApiError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::InvalidCaptcha => ApiError::InvalidCaptcha,
            ProcessError::MissingFile => ApiError::MissingFile,
            ProcessError::UnsupportedFormat => ApiError::UnsupportedFormat,
            ProcessError::Internal(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Upload {
            status: err.status(),
            message: format!("Failed to read upload: {}", err.body_text()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(name) => ApiError::NotFound(name),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ImagingError> for ApiError {
    fn from(err: ImagingError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
