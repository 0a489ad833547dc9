//! Video job endpoints under `/api/video`.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use bytes::BytesMut;
use futures::Stream;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use utoipa::OpenApi;

use animo_core::{Artifact, JobError};

use crate::error::ServerError;
use crate::schemas::video::{
    CreateVideoRequest, CreateVideoResponse, DeleteVideoResponse, JobListQuery,
    VideoStatusResponse,
};
use crate::state::AppState;

/// Size of each chunk sent by the streaming endpoints.
const STREAM_CHUNK: usize = 64 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(create_video, list_jobs, get_status, download_video, stream_video, delete_video),
    components(schemas(
        CreateVideoRequest,
        CreateVideoResponse,
        VideoStatusResponse,
        JobListQuery,
        DeleteVideoResponse
    ))
)]
pub struct VideoApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/create", post(create_video))
        .route("/jobs", get(list_jobs))
        .route("/status/{id}", get(get_status))
        .route("/download/{id}", get(download_video))
        .route("/stream/{id}", get(stream_video))
        .route("/{id}", delete(delete_video))
}

#[utoipa::path(
    post,
    path = "/api/video/create",
    tag = "video",
    request_body = CreateVideoRequest,
    responses(
        (status = 200, description = "Job queued", body = CreateVideoResponse),
        (status = 400, description = "Invalid request"),
        (status = 503, description = "Render queue is full"),
    )
)]
pub async fn create_video(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateVideoRequest>, JsonRejection>,
) -> Result<Json<CreateVideoResponse>, ServerError> {
    let Json(req) = body?;
    let request = req.into_render_request()?;
    let record = state.dispatcher.submit(request).await?;
    Ok(Json(CreateVideoResponse {
        job_id: record.id,
        status: record.status,
    }))
}

#[utoipa::path(
    get,
    path = "/api/video/jobs",
    tag = "video",
    params(JobListQuery),
    responses(
        (status = 200, description = "Jobs listed, newest first", body = [VideoStatusResponse]),
        (status = 400, description = "Unknown status filter"),
    )
)]
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(q): Query<JobListQuery>,
) -> Result<Json<Vec<VideoStatusResponse>>, ServerError> {
    let records = state.jobs.list(q.status_filter()?).await;
    Ok(Json(records.iter().map(VideoStatusResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/video/status/{id}",
    tag = "video",
    params(("id" = String, Path, description = "Job identifier")),
    responses(
        (status = 200, description = "Current job status", body = VideoStatusResponse),
        (status = 404, description = "Job not found"),
    )
)]
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<VideoStatusResponse>, ServerError> {
    let record = state.jobs.get(&id).await?;
    Ok(Json(VideoStatusResponse::from(&record)))
}

#[utoipa::path(
    get,
    path = "/api/video/download/{id}",
    tag = "video",
    params(("id" = String, Path, description = "Job identifier")),
    responses(
        (status = 200, description = "Video file as an attachment"),
        (status = 404, description = "Job or file not found"),
        (status = 409, description = "Video not ready"),
        (status = 422, description = "Video generation failed"),
    )
)]
pub async fn download_video(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ServerError> {
    let artifact = state.jobs.artifact(&id).await?;
    serve_artifact(artifact, true).await
}

#[utoipa::path(
    get,
    path = "/api/video/stream/{id}",
    tag = "video",
    params(("id" = String, Path, description = "Job identifier")),
    responses(
        (status = 200, description = "Video content, streamed in chunks"),
        (status = 404, description = "Job or file not found"),
        (status = 409, description = "Video not ready"),
        (status = 422, description = "Video generation failed"),
    )
)]
pub async fn stream_video(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ServerError> {
    let artifact = state.jobs.artifact(&id).await?;
    serve_artifact(artifact, false).await
}

#[utoipa::path(
    delete,
    path = "/api/video/{id}",
    tag = "video",
    params(("id" = String, Path, description = "Job identifier")),
    responses(
        (status = 200, description = "Job and video removed", body = DeleteVideoResponse),
        (status = 404, description = "Job not found"),
    )
)]
pub async fn delete_video(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteVideoResponse>, ServerError> {
    state.jobs.delete(&id).await?;
    Ok(Json(DeleteVideoResponse {
        message: "Video deleted successfully".to_owned(),
    }))
}

/// Stream a finished artifact from disk.
///
/// With `attachment` set the response carries a `Content-Disposition`
/// header so browsers save the file instead of playing it.
pub(super) async fn serve_artifact(
    artifact: Artifact,
    attachment: bool,
) -> Result<Response, ServerError> {
    let file = match File::open(&artifact.path).await {
        Ok(file) => file,
        // Deleted between the lookup and the open.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(JobError::ArtifactMissing {
                job_id: artifact.job_id,
            }
            .into());
        }
        Err(e) => return Err(e.into()),
    };
    let len = file.metadata().await?.len();

    let mut response = Response::new(Body::from_stream(chunked(file)));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(artifact.format.content_type()),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    if attachment {
        let disposition = format!(
            "attachment; filename=\"animo_{}.{}\"",
            artifact.job_id,
            artifact.format.extension()
        );
        if let Ok(value) = HeaderValue::from_str(&disposition) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }

    Ok(response)
}

fn chunked(file: File) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
    futures::stream::try_unfold(file, |mut file| async move {
        let mut buf = BytesMut::with_capacity(STREAM_CHUNK);
        let n = file.read_buf(&mut buf).await?;
        Ok((n > 0).then(|| (buf.freeze(), file)))
    })
}
