use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::AppState;

/// Health check endpoint for Docker/K8s liveness probes.
///
/// The store gates the status; the directory result is reported but a broken
/// directory alone does not mark the service unhealthy.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let directory = match state.directory.health_check().await {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Directory health check failed");
            "unavailable"
        }
    };

    match state.store.health_check().await {
        Ok(_) => {
            tracing::debug!("Health check passed");
            (
                StatusCode::OK,
                Json(json!({
                    "status": "ok",
                    "service": "portal-service",
                    "version": env!("CARGO_PKG_VERSION"),
                    "directory": directory
                })),
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed - store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "portal-service",
                    "error": e.to_string()
                })),
            )
        }
    }
}

/// Readiness check endpoint for K8s readiness probes.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
