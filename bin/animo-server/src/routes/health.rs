//! Health / heartbeat endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::schemas::health::HealthResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health), components(schemas(HealthResponse)))]
pub struct HealthApi;

/// Register health-check routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

/// Heartbeat endpoint.
///
/// Always answers 200. `status` is `"degraded"` when the renderer cannot be
/// invoked, so the service still reports job counts without Manim installed.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service status", body = HealthResponse)
    )
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let probe = state.renderer.probe().await;
    let jobs = state.jobs.stats().await;
    Json(HealthResponse {
        status: if probe.installed { "healthy" } else { "degraded" },
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        renderer_installed: probe.installed,
        renderer_version: probe.version,
        work_dir: state.config.work_dir.display().to_string(),
        active_jobs: jobs.active(),
        jobs,
    })
}
