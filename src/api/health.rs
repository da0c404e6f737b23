//! Health check endpoint
//!
//! GET /api/v1/health - process liveness plus a database ping

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::api::middleware::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub status: &'static str,
    pub database: &'static str,
}

/// GET /api/v1/health
///
/// Returns 503 when the database does not answer.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.db.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                success: true,
                status: "ok",
                database: "up",
            }),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {:#}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    success: false,
                    status: "degraded",
                    database: "down",
                }),
            )
        }
    }
}
