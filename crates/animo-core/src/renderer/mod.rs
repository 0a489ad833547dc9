//! Renderer abstraction.
//!
//! The dispatcher only talks to [`Renderer`]; [`ManimRenderer`] is the
//! production implementation that shells out to the `manim` CLI.

mod manim;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::RenderError;
use crate::scene;
use crate::tracker::ProgressReporter;
use crate::types::{JobId, JobRecord, OutputFormat, Quality};

pub use manim::ManimRenderer;

/// Everything a renderer needs to produce one video.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub job_id: JobId,
    /// Python scene source.
    pub source: String,
    /// Scene class inside `source`.
    pub scene: String,
    pub quality: Quality,
    pub format: OutputFormat,
}

impl RenderJob {
    /// Build the render input from a tracked record.
    ///
    /// Fails if user-supplied scene code does not pass the sanitizer.
    pub fn from_record(record: &JobRecord) -> Result<Self, RenderError> {
        Ok(Self {
            job_id: record.id.clone(),
            source: scene::scene_source(&record.request)?,
            scene: record.request.scene_name().to_owned(),
            quality: record.request.quality,
            format: record.request.format,
        })
    }
}

/// Result of checking whether the renderer is usable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RendererProbe {
    pub installed: bool,
    pub version: Option<String>,
}

/// External collaborator that turns a [`RenderJob`] into a video file.
#[async_trait]
pub trait Renderer: Send + Sync + 'static {
    /// Render `job` and return the path of the finished artifact.
    async fn render(
        &self,
        job: &RenderJob,
        progress: &ProgressReporter,
    ) -> Result<PathBuf, RenderError>;

    /// Report whether the renderer is installed and which version.
    async fn probe(&self) -> RendererProbe;
}
