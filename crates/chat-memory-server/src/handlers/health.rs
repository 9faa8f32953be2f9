use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::services::conversation::ConversationMemory;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
}

pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Ready once the history store answers.
pub async fn readiness_check(State(memory): State<ConversationMemory>) -> StatusCode {
    if memory.is_available().await {
        StatusCode::OK
    } else {
        tracing::warn!("Readiness check failed: history store unreachable");
        StatusCode::SERVICE_UNAVAILABLE
    }
}
