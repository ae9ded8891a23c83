//! Readiness endpoint
//!
//! Reports 200 while the store answers a read transaction and 503 otherwise.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// Liveness plus a read transaction against the store
pub async fn health_check(State(state): State<AppState>) -> Response {
    match state.store.ping() {
        Ok(()) => ApiResponse::ok(
            "Service is healthy",
            HealthStatus {
                status: "ok",
                version: env!("CARGO_PKG_VERSION"),
                timestamp: Utc::now(),
            },
        )
        .into_response(),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "success": false, "message": "Database connection failed" })),
            )
                .into_response()
        }
    }
}
