//! Mapping of request failures to HTTP responses.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dermascan_core::{InferenceError, ProcessingError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message returned for every processing failure. Details stay in the logs.
pub const PROCESSING_FAILED: &str = "Error processing image";

/// Message returned when the upload is not declared as an image.
pub const NOT_AN_IMAGE: &str = "File must be an image";

/// Error body, `{"detail": "..."}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// Errors surfaced by the endpoint layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Client sent something other than a usable image upload (400)
    #[error("{0}")]
    InvalidInput(String),

    /// Request body exceeded the upload limit (413)
    #[error("{0}")]
    TooLarge(String),

    /// Decode or inference failed (500, generic message)
    #[error(transparent)]
    Processing(#[from] ProcessingError),
}

impl From<InferenceError> for ApiError {
    fn from(err: InferenceError) -> Self {
        ApiError::Processing(err.into())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::TooLarge(err.body_text())
        } else {
            ApiError::InvalidInput(format!("Malformed multipart body: {}", err.body_text()))
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::InvalidInput(message) => {
                tracing::debug!("Rejected upload: {}", message);
                (StatusCode::BAD_REQUEST, message)
            }
            ApiError::TooLarge(message) => {
                tracing::debug!("Rejected upload: {}", message);
                (StatusCode::PAYLOAD_TOO_LARGE, message)
            }
            ApiError::Processing(err) => {
                tracing::error!("Prediction error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    PROCESSING_FAILED.to_string(),
                )
            }
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}
