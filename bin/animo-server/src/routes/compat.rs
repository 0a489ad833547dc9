//! Script-based endpoints kept for existing clients: `/create-video`,
//! `/job/{id}` and `/videos/{id}`.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::info;
use utoipa::OpenApi;

use animo_core::JobError;

use crate::error::ServerError;
use crate::routes::video::serve_artifact;
use crate::schemas::video::{
    JobDetailResponse, PendingVideoResponse, ScriptVideoRequest, ScriptVideoResponse,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(create_script_video, get_job, get_video),
    components(schemas(
        ScriptVideoRequest,
        ScriptVideoResponse,
        JobDetailResponse,
        PendingVideoResponse
    ))
)]
pub struct CompatApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/create-video", post(create_script_video))
        .route("/job/{id}", get(get_job))
        .route("/videos/{id}", get(get_video))
}

#[utoipa::path(
    post,
    path = "/create-video",
    tag = "compat",
    request_body = ScriptVideoRequest,
    responses(
        (status = 200, description = "Job queued", body = ScriptVideoResponse),
        (status = 400, description = "Invalid or forbidden script"),
        (status = 503, description = "Render queue is full"),
    )
)]
pub async fn create_script_video(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ScriptVideoRequest>, JsonRejection>,
) -> Result<Json<ScriptVideoResponse>, ServerError> {
    let Json(req) = body?;
    let request = req.into_render_request()?;
    let record = state.dispatcher.submit(request).await?;
    info!(job_id = %record.id, "script video job created");
    Ok(Json(ScriptVideoResponse {
        video_url: format!("/videos/{}", record.id),
        job_id: record.id,
        status: record.status,
        message: "Video generation started".to_owned(),
    }))
}

#[utoipa::path(
    get,
    path = "/job/{id}",
    tag = "compat",
    params(("id" = String, Path, description = "Job identifier")),
    responses(
        (status = 200, description = "Full job record", body = JobDetailResponse),
        (status = 404, description = "Job not found"),
    )
)]
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobDetailResponse>, ServerError> {
    let record = state.jobs.get(&id).await?;
    Ok(Json(record.into()))
}

/// Download alias that answers `202` while the job is still running.
#[utoipa::path(
    get,
    path = "/videos/{id}",
    tag = "compat",
    params(("id" = String, Path, description = "Job identifier")),
    responses(
        (status = 200, description = "Video file"),
        (status = 202, description = "Video still being generated", body = PendingVideoResponse),
        (status = 404, description = "Job or file not found"),
        (status = 422, description = "Video generation failed"),
    )
)]
pub async fn get_video(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ServerError> {
    match state.jobs.artifact(&id).await {
        Ok(artifact) => serve_artifact(artifact, true).await,
        Err(JobError::NotReady { status, .. }) => Ok((
            StatusCode::ACCEPTED,
            Json(PendingVideoResponse {
                status,
                message: "Video is still being generated".to_owned(),
            }),
        )
            .into_response()),
        Err(e) => Err(e.into()),
    }
}
