use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::services::BackendError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Backend failure; `public` is what the caller sees, `detail` is only logged.
    #[error("LLM error: {detail}")]
    LlmError { public: String, detail: String },
}

impl ApiError {
    pub fn llm(public: &str, err: &BackendError) -> Self {
        ApiError::LlmError {
            public: public.to_string(),
            detail: err.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized: {}", msg);
                (StatusCode::UNAUTHORIZED, "Unauthorized", msg)
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, "BadRequest", msg)
            }
            ApiError::LlmError { public, detail } => {
                tracing::error!("LLM error: {}", detail);
                (StatusCode::INTERNAL_SERVER_ERROR, "LlmError", public)
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}
