use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier of a render job (a UUIDv4 string).
pub type JobId = String;

/// Scene class rendered when the request does not name one.
pub const DEFAULT_SCENE: &str = "EducationalVideo";

/// Lifecycle state of a render job.
///
/// Transitions are monotonic: `Queued → Processing → Completed | Failed`.
/// A queued job may also fail directly if it never reaches a worker.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Returns `true` once the job can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether moving from `self` to `next` respects the lifecycle order.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Queued, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

/// What the animation body shows.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SceneKind {
    /// LaTeX rendered through `MathTex`.
    Equation,
    /// Plain text paragraph.
    Text,
    #[default]
    Explanation,
    ProblemSolving,
    Concept,
}

/// Colour scheme of the generated scene.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Style {
    #[default]
    Minimal,
    Colorful,
    Professional,
}

/// Background, primary and secondary colours of a [`Style`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: &'static str,
    pub primary: &'static str,
    pub secondary: &'static str,
}

impl Style {
    pub fn palette(&self) -> Palette {
        match self {
            Style::Minimal => Palette {
                background: "#FFFFFF",
                primary: "#000000",
                secondary: "#666666",
            },
            Style::Colorful => Palette {
                background: "#1e1e2e",
                primary: "#f38ba8",
                secondary: "#89b4fa",
            },
            Style::Professional => Palette {
                background: "#f8f9fa",
                primary: "#212529",
                secondary: "#495057",
            },
        }
    }
}

/// Render quality preset, mapped onto the renderer's `-q` flags.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Quality {
    #[serde(alias = "low_quality")]
    Low,
    #[default]
    #[serde(alias = "medium_quality")]
    Medium,
    #[serde(alias = "high_quality")]
    High,
    #[serde(alias = "production_quality")]
    Production,
}

impl Quality {
    pub fn flag(&self) -> &'static str {
        match self {
            Quality::Low => "-ql",
            Quality::Medium => "-qm",
            Quality::High => "-qh",
            Quality::Production => "-qp",
        }
    }
}

/// Container format of the produced artifact.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Mp4,
    Mov,
    Webm,
    Gif,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Mov => "mov",
            OutputFormat::Webm => "webm",
            OutputFormat::Gif => "gif",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "video/mp4",
            OutputFormat::Mov => "video/quicktime",
            OutputFormat::Webm => "video/webm",
            OutputFormat::Gif => "image/gif",
        }
    }
}

/// Parameters describing the video a client asked for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderRequest {
    #[serde(rename = "type")]
    pub kind: SceneKind,
    pub text: Option<String>,
    pub topic: Option<String>,
    pub grade: Option<u32>,
    pub course: Option<String>,
    pub style: Style,
    pub quality: Quality,
    pub format: OutputFormat,
    /// Complete scene source; replaces the generated template when present.
    pub code: Option<String>,
    /// Scene class to render; [`DEFAULT_SCENE`] when absent.
    pub scene: Option<String>,
}

impl RenderRequest {
    pub fn scene_name(&self) -> &str {
        self.scene.as_deref().unwrap_or(DEFAULT_SCENE)
    }
}

/// The in-memory record of one render job.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: JobId,
    pub status: JobStatus,
    /// Coarse 0-100 progress indicator.
    pub progress: u8,
    pub request: RenderRequest,
    /// Set once the job completed.
    pub output_path: Option<PathBuf>,
    /// Set once the job failed.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(id: JobId, request: RenderRequest) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Queued,
            progress: 0,
            request,
            output_path: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A finished video ready to be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub job_id: JobId,
    pub path: PathBuf,
    pub format: OutputFormat,
}

/// Number of tracked jobs in each state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl JobStats {
    /// Jobs that have not reached a terminal state yet.
    pub fn active(&self) -> usize {
        self.queued + self.processing
    }

    pub fn total(&self) -> usize {
        self.queued + self.processing + self.completed + self.failed
    }
}
