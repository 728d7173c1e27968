//! Error types for model loading, inference and the HTTP boundary.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// A single model load attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read model file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("tensorflow: {0}")]
    Backend(String),
    #[error("operation '{0}' not found in graph")]
    MissingOperation(String),
}

impl From<tensorflow::Status> for LoadError {
    fn from(status: tensorflow::Status) -> Self {
        LoadError::Backend(status.to_string())
    }
}

impl From<std::ffi::NulError> for LoadError {
    fn from(err: std::ffi::NulError) -> Self {
        LoadError::Backend(err.to_string())
    }
}

/// Failure while turning one upload into a prediction.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("tensor shape {shape:?} expects {expected} values, got {actual}")]
    Shape {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },
    #[error("inference failed: {0}")]
    Backend(String),
    #[error("model returned an empty output vector")]
    EmptyOutput,
    #[error("model returned NaN for class {0}")]
    NanScore(usize),
}

impl From<tensorflow::Status> for InferenceError {
    fn from(status: tensorflow::Status) -> Self {
        InferenceError::Backend(status.to_string())
    }
}

/// Errors surfaced by the HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Model not loaded")]
    ModelUnavailable(Option<String>),
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),
    #[error("Prediction failed: {0}")]
    PredictionFailed(#[from] InferenceError),
    #[error("Prediction failed: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            ApiError::ModelUnavailable(details) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Model not loaded", details)
            }
            ApiError::InvalidUpload(details) => {
                (StatusCode::BAD_REQUEST, "Invalid upload", Some(details))
            }
            ApiError::PredictionFailed(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Prediction failed",
                Some(err.to_string()),
            ),
            ApiError::Internal(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Prediction failed",
                Some(details),
            ),
        };

        (status, Json(ErrorResponse { error, details })).into_response()
    }
}
