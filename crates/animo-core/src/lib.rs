//! Job tracking and rendering core of animo.
//!
//! A [`Dispatcher`] accepts [`RenderRequest`]s, records them in a shared
//! [`JobTracker`] and renders them through a [`Renderer`] with bounded
//! concurrency. Job state lives in memory for the lifetime of the process.

mod dispatcher;
mod error;
mod tracker;
mod types;

pub mod renderer;
pub mod scene;


pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use error::{JobError, RenderError};
pub use renderer::{ManimRenderer, RenderJob, Renderer, RendererProbe};
pub use tracker::{JobTracker, ProgressReporter};
pub use types::{
    Artifact, JobId, JobRecord, JobStats, JobStatus, OutputFormat, Palette, Quality, RenderRequest,
    SceneKind, Style, DEFAULT_SCENE,
};
