use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::JobError;
use crate::types::{Artifact, JobId, JobRecord, JobStats, JobStatus, RenderRequest};

/// Longest pause between two retention sweeps.
const MAX_REAP_INTERVAL: Duration = Duration::from_secs(60);

/// Thread-safe, in-memory store of render jobs.
///
/// Cloning is cheap; all clones share the same map. Every mutation takes the
/// write lock once and never awaits while holding it, so a job's record is
/// always observed in a consistent state.
#[derive(Debug, Clone, Default)]
pub struct JobTracker {
    inner: Arc<RwLock<HashMap<JobId, JobRecord>>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh id and store a `Queued` record for `request`.
    pub async fn insert(&self, request: RenderRequest) -> JobRecord {
        let mut guard = self.inner.write().await;
        let mut id = Uuid::new_v4().to_string();
        while guard.contains_key(&id) {
            id = Uuid::new_v4().to_string();
        }
        let record = JobRecord::new(id.clone(), request);
        guard.insert(id, record.clone());
        record
    }

    /// Snapshot of a single job.
    pub async fn get(&self, job_id: &str) -> Result<JobRecord, JobError> {
        self.inner
            .read()
            .await
            .get(job_id)
            .cloned()
            .ok_or_else(|| not_found(job_id))
    }

    /// All jobs, newest first, optionally restricted to one status.
    pub async fn list(&self, status: Option<JobStatus>) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self
            .inner
            .read()
            .await
            .values()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    pub async fn stats(&self) -> JobStats {
        let guard = self.inner.read().await;
        let mut stats = JobStats::default();
        for record in guard.values() {
            match record.status {
                JobStatus::Queued => stats.queued += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// The finished video of a job.
    ///
    /// `NotReady` while the job is queued or processing, `Failed` with the
    /// stored error once it failed, `ArtifactMissing` if the file vanished.
    pub async fn artifact(&self, job_id: &str) -> Result<Artifact, JobError> {
        let record = self.get(job_id).await?;
        match record.status {
            JobStatus::Completed => {}
            JobStatus::Failed => {
                return Err(JobError::Failed {
                    job_id: record.id,
                    error: record.error.unwrap_or_default(),
                });
            }
            status => {
                return Err(JobError::NotReady {
                    job_id: record.id,
                    status,
                });
            }
        }
        let path = record.output_path.ok_or_else(|| JobError::ArtifactMissing {
            job_id: job_id.to_owned(),
        })?;
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            warn!(job_id, path = %path.display(), "completed job has no file on disk");
            return Err(JobError::ArtifactMissing {
                job_id: job_id.to_owned(),
            });
        }
        Ok(Artifact {
            job_id: record.id,
            path,
            format: record.request.format,
        })
    }

    /// Remove a job and its output file.
    pub async fn delete(&self, job_id: &str) -> Result<JobRecord, JobError> {
        let record = self
            .inner
            .write()
            .await
            .remove(job_id)
            .ok_or_else(|| not_found(job_id))?;
        if let Some(path) = &record.output_path {
            remove_artifact(path).await;
        }
        info!(job_id, status = %record.status, "job deleted");
        Ok(record)
    }

    /// Handle the renderer uses to publish progress for `job_id`.
    pub fn reporter(&self, job_id: &str) -> ProgressReporter {
        ProgressReporter {
            tracker: self.clone(),
            job_id: job_id.to_owned(),
        }
    }

    /// Drop a record that never reached the render queue.
    pub(crate) async fn discard(&self, job_id: &str) {
        self.inner.write().await.remove(job_id);
    }

    /// `Queued → Processing`; returns the updated record.
    pub(crate) async fn mark_processing(&self, job_id: &str) -> Option<JobRecord> {
        self.transition(job_id, JobStatus::Processing, |r| r.progress = 10)
            .await
    }

    /// `Processing → Completed`. Returns `false` if the job is gone.
    pub(crate) async fn complete(&self, job_id: &str, output_path: PathBuf) -> bool {
        self.transition(job_id, JobStatus::Completed, move |r| {
            r.output_path = Some(output_path);
            r.progress = 100;
        })
        .await
        .is_some()
    }

    /// Record a terminal failure with `error` as the message.
    pub(crate) async fn fail(&self, job_id: &str, error: String) -> bool {
        self.transition(job_id, JobStatus::Failed, move |r| r.error = Some(error))
            .await
            .is_some()
    }

    async fn transition(
        &self,
        job_id: &str,
        next: JobStatus,
        apply: impl FnOnce(&mut JobRecord),
    ) -> Option<JobRecord> {
        let mut guard = self.inner.write().await;
        let record = guard.get_mut(job_id)?;
        if !record.status.can_transition_to(next) {
            warn!(job_id, from = %record.status, to = %next, "ignoring out-of-order transition");
            return None;
        }
        record.status = next;
        record.updated_at = Utc::now();
        apply(record);
        debug!(job_id, status = %next, "job transitioned");
        Some(record.clone())
    }

    async fn set_progress(&self, job_id: &str, progress: u8) {
        if let Some(record) = self.inner.write().await.get_mut(job_id)
            && record.status == JobStatus::Processing
            && progress > record.progress
        {
            record.progress = progress.min(99);
            record.updated_at = Utc::now();
        }
    }

    /// Delete terminal jobs last updated more than `ttl` ago.
    pub async fn reap_expired(&self, ttl: Duration) -> usize {
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return 0;
        };
        let cutoff = Utc::now() - ttl;
        let expired: Vec<JobRecord> = {
            let mut guard = self.inner.write().await;
            let ids: Vec<JobId> = guard
                .values()
                .filter(|r| r.status.is_terminal() && r.updated_at < cutoff)
                .map(|r| r.id.clone())
                .collect();
            ids.iter().filter_map(|id| guard.remove(id)).collect()
        };
        for record in &expired {
            if let Some(path) = &record.output_path {
                remove_artifact(path).await;
            }
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "expired jobs removed");
        }
        expired.len()
    }

    /// Periodically run [`Self::reap_expired`] in a background task.
    pub fn spawn_reaper(&self, ttl: Duration) -> tokio::task::JoinHandle<()> {
        let tracker = self.clone();
        let period = ttl.min(MAX_REAP_INTERVAL).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                tracker.reap_expired(ttl).await;
            }
        })
    }
}

/// Progress sink bound to one job.
///
/// Updates are ignored unless the job is processing and the value grows;
/// 100 is reserved for completion.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tracker: JobTracker,
    job_id: JobId,
}

impl ProgressReporter {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub async fn report(&self, progress: u8) {
        self.tracker.set_progress(&self.job_id, progress).await;
    }
}

fn not_found(job_id: &str) -> JobError {
    JobError::NotFound {
        job_id: job_id.to_owned(),
    }
}

pub(crate) async fn remove_artifact(path: &std::path::Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "artifact removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove artifact"),
    }
}
