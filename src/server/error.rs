//! HTTP error responses.
//!
//! Only request validation and report rendering produce non-2xx statuses;
//! analysis failures are reported inside a 200 response body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid file type. Only PDF files are supported.")]
    InvalidFileType,

    #[error("No file provided. Use field name 'file'.")]
    MissingFile,

    #[error("Failed to read uploaded file.")]
    UploadRead,

    #[error("File too large. Max size is {max_mb:.1} MB.")]
    TooLarge { max_mb: f64 },

    #[error("PDF generation failed: {0}")]
    Report(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl ApiError {
    pub fn too_large(max_bytes: usize) -> Self {
        ApiError::TooLarge {
            max_mb: max_bytes as f64 / (1024.0 * 1024.0),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidFileType | ApiError::MissingFile | ApiError::UploadRead => {
                StatusCode::BAD_REQUEST
            }
            ApiError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Report(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorResponse {
            detail: self.to_string(),
        });
        (status, body).into_response()
    }
}
