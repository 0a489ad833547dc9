use serde::Serialize;
use utoipa::ToSchema;

use animo_core::JobStats;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `"healthy"` when the renderer answers its version probe, else `"degraded"`.
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub renderer_installed: bool,
    pub renderer_version: Option<String>,
    pub work_dir: String,
    /// Jobs that are queued or processing.
    pub active_jobs: usize,
    #[schema(value_type = Object)]
    pub jobs: JobStats,
}
