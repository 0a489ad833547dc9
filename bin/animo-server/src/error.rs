//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors become a JSON body
//! `{"error": "..."}` with an appropriate status code.
//!
//! Internal errors are logged with full detail but only a generic message is
//! returned, so file paths and process output never leak to clients.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use animo_core::JobError;

/// All errors that can occur in the animo-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Propagated from the job tracker or dispatcher.
    #[error(transparent)]
    Job(#[from] JobError),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ServerError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ServerError::Job(e) => match e {
                JobError::NotFound { .. } => (StatusCode::NOT_FOUND, "Job not found".to_owned()),
                JobError::ArtifactMissing { .. } => {
                    (StatusCode::NOT_FOUND, "Video file not found".to_owned())
                }
                JobError::NotReady { .. } => (StatusCode::CONFLICT, e.to_string()),
                JobError::Failed { .. } => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
                JobError::QueueFull { .. } | JobError::DispatcherClosed => {
                    (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
                }
                JobError::Io(io) => {
                    error!(error = %io, "job storage io error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal server error".to_owned(),
                    )
                }
            },
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = self.status_and_message();
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

impl From<JsonRejection> for ServerError {
    fn from(e: JsonRejection) -> Self {
        ServerError::BadRequest(e.body_text())
    }
}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        ServerError::Job(JobError::Io(e))
    }
}

impl From<validator::ValidationErrors> for ServerError {
    fn from(e: validator::ValidationErrors) -> Self {
        ServerError::BadRequest(e.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use animo_core::JobStatus;
    use tracing_test::traced_test;

    fn status_of(e: ServerError) -> StatusCode {
        e.into_response().status()
    }

    #[test]
    fn job_errors_map_to_client_statuses() {
        let id = || "abc".to_owned();
        assert_eq!(status_of(JobError::NotFound { job_id: id() }.into()), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(JobError::ArtifactMissing { job_id: id() }.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(
                JobError::NotReady {
                    job_id: id(),
                    status: JobStatus::Processing
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(
                JobError::Failed {
                    job_id: id(),
                    error: "boom".into()
                }
                .into()
            ),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(JobError::QueueFull { capacity: 1 }.into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    #[traced_test]
    fn internal_details_are_hidden_but_logged() {
        let io = std::io::Error::other("/secret/path/video.mp4: permission denied");
        let (status, message) = ServerError::from(io).status_and_message();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "internal server error");
        assert!(logs_contain("/secret/path"));
    }

    #[test]
    fn not_ready_message_names_the_status() {
        let (_, message) = ServerError::from(JobError::NotReady {
            job_id: "abc".into(),
            status: JobStatus::Queued,
        })
        .status_and_message();
        assert_eq!(message, "video not ready (status: queued)");
    }
}
