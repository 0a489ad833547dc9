use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use animo_core::scene;
use animo_core::{JobRecord, JobStatus, OutputFormat, Quality, RenderRequest, SceneKind, Style};

use crate::error::ServerError;

/// Scene class expected in scripts posted to `/create-video`.
pub const SCRIPT_SCENE: &str = "SolutionVideo";

const MAX_CODE_CHARS: u64 = 64 * 1024;

#[derive(Debug, Clone, Default, Deserialize, ToSchema, Validate)]
#[serde(default)]
pub struct CreateVideoRequest {
    /// `equation`, `text`, `explanation`, `problem-solving` or `concept`.
    #[serde(rename = "type", alias = "videoType")]
    #[schema(value_type = String, example = "equation")]
    pub kind: SceneKind,
    /// LaTeX for `equation` videos, plain text otherwise.
    #[serde(alias = "prompt")]
    #[validate(length(max = 4096, message = "text must be at most 4096 characters"))]
    pub text: Option<String>,
    #[serde(alias = "title")]
    #[validate(length(max = 200, message = "topic must be at most 200 characters"))]
    pub topic: Option<String>,
    pub grade: Option<u32>,
    #[validate(length(max = 200, message = "course must be at most 200 characters"))]
    pub course: Option<String>,
    #[schema(value_type = String, example = "minimal")]
    pub style: Style,
    #[schema(value_type = String, example = "medium")]
    pub quality: Quality,
    #[schema(value_type = String, example = "mp4")]
    pub format: OutputFormat,
    /// Complete Manim scene source; replaces the generated template.
    #[serde(alias = "manimCode", alias = "script")]
    #[validate(length(max = MAX_CODE_CHARS, message = "code must be at most 64 KiB"))]
    pub code: Option<String>,
    /// Scene class to render (default `EducationalVideo`).
    #[validate(custom(function = "validate_scene"))]
    pub scene: Option<String>,
}

impl CreateVideoRequest {
    /// Validate the body and convert it into a core [`RenderRequest`].
    pub fn into_render_request(self) -> Result<RenderRequest, ServerError> {
        self.validate()?;

        let text = non_blank(self.text);
        let code = non_blank(self.code);
        if matches!(self.kind, SceneKind::Equation | SceneKind::Text)
            && text.is_none()
            && code.is_none()
        {
            return Err(ServerError::BadRequest(format!(
                "text is required for {} videos",
                self.kind
            )));
        }
        if let Some(code) = &code {
            check_code(code)?;
        }

        Ok(RenderRequest {
            kind: self.kind,
            text,
            topic: non_blank(self.topic),
            grade: self.grade,
            course: non_blank(self.course),
            style: self.style,
            quality: self.quality,
            format: self.format,
            code,
            scene: non_blank(self.scene),
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateVideoResponse {
    pub job_id: String,
    #[schema(value_type = String, example = "queued")]
    pub status: JobStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VideoStatusResponse {
    pub job_id: String,
    #[schema(value_type = String, example = "processing")]
    pub status: JobStatus,
    pub progress: u8,
    pub error: Option<String>,
    /// Set once the video is ready.
    pub download_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&JobRecord> for VideoStatusResponse {
    fn from(record: &JobRecord) -> Self {
        Self {
            job_id: record.id.clone(),
            status: record.status,
            progress: record.progress,
            error: record.error.clone(),
            download_url: (record.status == JobStatus::Completed)
                .then(|| format!("/api/video/download/{}", record.id)),
            created_at: record.created_at.to_rfc3339(),
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct JobListQuery {
    /// Only list jobs in this state.
    pub status: Option<String>,
}

impl JobListQuery {
    pub fn status_filter(&self) -> Result<Option<JobStatus>, ServerError> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => s
                .parse::<JobStatus>()
                .map(Some)
                .map_err(|_| ServerError::BadRequest(format!("unknown job status: {s}"))),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteVideoResponse {
    pub message: String,
}

/// Raw-script job submitted to `/create-video`.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct ScriptVideoRequest {
    /// Python source defining a `SolutionVideo` scene.
    #[validate(length(min = 1, max = MAX_CODE_CHARS, message = "script must be 1 byte to 64 KiB"))]
    pub script: String,
    #[serde(default = "default_title")]
    #[validate(length(max = 200, message = "title must be at most 200 characters"))]
    pub title: String,
    /// `low_quality`, `medium_quality`, `high_quality` or `production_quality`.
    #[serde(default)]
    #[schema(value_type = String, example = "medium_quality")]
    pub quality: Quality,
    #[serde(default)]
    #[schema(value_type = String, example = "mp4")]
    pub format: OutputFormat,
}

impl ScriptVideoRequest {
    pub fn into_render_request(self) -> Result<RenderRequest, ServerError> {
        self.validate()?;
        check_code(&self.script)?;
        Ok(RenderRequest {
            topic: Some(self.title),
            quality: self.quality,
            format: self.format,
            code: Some(self.script),
            scene: Some(SCRIPT_SCENE.to_owned()),
            ..RenderRequest::default()
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ScriptVideoResponse {
    pub job_id: String,
    #[schema(value_type = String, example = "queued")]
    pub status: JobStatus,
    pub video_url: String,
    pub message: String,
}

/// Full job record, including the request and the artifact path.
#[derive(Debug, Serialize, ToSchema)]
pub struct JobDetailResponse {
    pub job_id: String,
    #[schema(value_type = String, example = "completed")]
    pub status: JobStatus,
    pub progress: u8,
    pub output_path: Option<String>,
    pub error: Option<String>,
    #[schema(value_type = Object)]
    pub request: RenderRequest,
    pub created_at: String,
    pub updated_at: String,
}

impl From<JobRecord> for JobDetailResponse {
    fn from(record: JobRecord) -> Self {
        Self {
            job_id: record.id,
            status: record.status,
            progress: record.progress,
            output_path: record.output_path.map(|p| p.display().to_string()),
            error: record.error,
            request: record.request,
            created_at: record.created_at.to_rfc3339(),
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

/// Returned by `/videos/{id}` while the job is still running.
#[derive(Debug, Serialize, ToSchema)]
pub struct PendingVideoResponse {
    #[schema(value_type = String, example = "processing")]
    pub status: JobStatus,
    pub message: String,
}

fn default_title() -> String {
    "solution".to_owned()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn check_code(code: &str) -> Result<(), ServerError> {
    scene::sanitize(code)
        .map(|_| ())
        .map_err(|e| ServerError::BadRequest(e.to_string()))
}

fn validate_scene(scene: &str) -> Result<(), ValidationError> {
    if scene.is_empty() || scene::is_identifier(scene) {
        Ok(())
    } else {
        Err(ValidationError::new("scene")
            .with_message("scene must be a Python identifier".into()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(body: &str) -> CreateVideoRequest {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn aliases_are_accepted() {
        let req = parse(
            r#"{"videoType":"problem-solving","prompt":"2+2","title":"Toplama","manimCode":"x = 1","quality":"high_quality"}"#,
        )
        .into_render_request()
        .unwrap();
        assert_eq!(req.kind, SceneKind::ProblemSolving);
        assert_eq!(req.text.as_deref(), Some("2+2"));
        assert_eq!(req.topic.as_deref(), Some("Toplama"));
        assert_eq!(req.code.as_deref(), Some("x = 1"));
        assert_eq!(req.quality, Quality::High);
    }

    #[test]
    fn empty_body_uses_defaults() {
        let req = parse("{}").into_render_request().unwrap();
        assert_eq!(req, RenderRequest::default());
    }

    #[test]
    fn equation_without_text_is_rejected() {
        let err = parse(r#"{"type":"equation","text":"  "}"#)
            .into_render_request()
            .unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(m) if m.contains("equation")));
    }

    #[test]
    fn equation_with_code_needs_no_text() {
        let req = parse(r#"{"type":"equation","code":"from manim import *"}"#)
            .into_render_request()
            .unwrap();
        assert!(req.text.is_none());
    }

    #[test]
    fn forbidden_code_is_rejected_up_front() {
        let err = parse(r#"{"code":"import os\nos.remove('/')"}"#)
            .into_render_request()
            .unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(m) if m == "Forbidden import: os"));
    }

    #[test]
    fn scene_must_be_identifier() {
        let err = parse(r#"{"scene":"Bad Scene;"}"#)
            .into_render_request()
            .unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(_)));
        assert!(parse(r#"{"scene":"MyScene2"}"#).into_render_request().is_ok());
    }

    #[test]
    fn overlong_text_is_rejected() {
        let body = serde_json::json!({ "text": "x".repeat(4097) }).to_string();
        assert!(parse(&body).into_render_request().is_err());
    }

    #[test]
    fn script_request_targets_solution_scene() {
        let req: ScriptVideoRequest =
            serde_json::from_str(r#"{"script":"from manim import *"}"#).unwrap();
        assert_eq!(req.title, "solution");
        let render = req.into_render_request().unwrap();
        assert_eq!(render.scene.as_deref(), Some(SCRIPT_SCENE));
        assert_eq!(render.code.as_deref(), Some("from manim import *"));
    }

    #[test]
    fn status_filter_parses_known_values() {
        let q = JobListQuery {
            status: Some("failed".into()),
        };
        assert_eq!(q.status_filter().unwrap(), Some(JobStatus::Failed));
        assert_eq!(JobListQuery::default().status_filter().unwrap(), None);
        let q = JobListQuery {
            status: Some("done".into()),
        };
        assert!(q.status_filter().is_err());
    }
}
