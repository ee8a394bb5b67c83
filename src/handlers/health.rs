//! Liveness check for load balancers and uptime checks. Public.

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::DbPool;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// `GET /health`
///
/// # Response (200 OK)
///
/// ```json
/// { "status": "healthy", "database": "connected", "timestamp": "2025-04-10T19:00:00Z" }
/// ```
///
/// # Response (503 Service Unavailable)
///
/// Same shape with `"status": "unhealthy"` and `"database": "disconnected"`
/// when `SELECT 1` fails.
pub async fn health_check(State(pool): State<DbPool>) -> (StatusCode, Json<HealthResponse>) {
    match sqlx::query("SELECT 1").execute(&pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                database: "connected",
                timestamp: Utc::now(),
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy",
                    database: "disconnected",
                    timestamp: Utc::now(),
                }),
            )
        }
    }
}
