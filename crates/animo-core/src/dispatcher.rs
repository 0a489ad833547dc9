use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::error::{JobError, RenderError};
use crate::renderer::{RenderJob, Renderer};
use crate::tracker::{remove_artifact, JobTracker};
use crate::types::{JobId, JobRecord, RenderRequest};

/// Sizing of the render queue and worker pool.
#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    /// Maximum number of jobs waiting for a worker.
    pub queue_capacity: usize,
    /// Maximum number of renders running at once.
    pub max_concurrent: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            max_concurrent: 2,
        }
    }
}

/// Accepts render jobs and drives them through the [`Renderer`].
///
/// [`Dispatcher::submit`] stores a queued record and pushes its id onto a
/// bounded channel. A background loop pops ids, waits for a free worker
/// permit and runs each render in its own task, so at most
/// `max_concurrent` renderer processes exist at any time.
///
/// ```rust,ignore
/// let tracker = JobTracker::new();
/// let dispatcher = Dispatcher::start(tracker.clone(), Arc::new(renderer), DispatcherConfig::default());
/// let record = dispatcher.submit(request).await?;
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    tracker: JobTracker,
    submit_tx: mpsc::Sender<JobId>,
    config: DispatcherConfig,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("queue_capacity", &self.config.queue_capacity)
            .field("max_concurrent", &self.config.max_concurrent)
            .field("queued", &(self.config.queue_capacity - self.submit_tx.capacity()))
            .finish()
    }
}

impl Dispatcher {
    /// Spawn the dispatch loop and return a submission handle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        tracker: JobTracker,
        renderer: Arc<dyn Renderer>,
        config: DispatcherConfig,
    ) -> Self {
        let config = DispatcherConfig {
            queue_capacity: config.queue_capacity.max(1),
            max_concurrent: config.max_concurrent.max(1),
        };
        let (submit_tx, submit_rx) = mpsc::channel::<JobId>(config.queue_capacity);
        let workers = Arc::new(Semaphore::new(config.max_concurrent));

        let loop_tracker = tracker.clone();
        tokio::spawn(async move {
            Self::run_loop(submit_rx, loop_tracker, renderer, workers).await;
        });
        info!(
            queue_capacity = config.queue_capacity,
            max_concurrent = config.max_concurrent,
            "render dispatcher started"
        );

        Self {
            tracker,
            submit_tx,
            config,
        }
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    pub fn config(&self) -> DispatcherConfig {
        self.config
    }

    /// Register a job for `request` and queue it for rendering.
    ///
    /// Returns immediately with the `Queued` record. If the queue is full
    /// the record is dropped again and [`JobError::QueueFull`] is returned.
    pub async fn submit(&self, request: RenderRequest) -> Result<JobRecord, JobError> {
        let record = self.tracker.insert(request).await;
        match self.submit_tx.try_send(record.id.clone()) {
            Ok(()) => {
                info!(job_id = %record.id, kind = %record.request.kind, "job queued");
                Ok(record)
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.tracker.discard(&record.id).await;
                warn!(capacity = self.config.queue_capacity, "render queue full; job rejected");
                Err(JobError::QueueFull {
                    capacity: self.config.queue_capacity,
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.tracker.discard(&record.id).await;
                error!("render dispatcher stopped; job rejected");
                Err(JobError::DispatcherClosed)
            }
        }
    }

    async fn run_loop(
        mut rx: mpsc::Receiver<JobId>,
        tracker: JobTracker,
        renderer: Arc<dyn Renderer>,
        workers: Arc<Semaphore>,
    ) {
        while let Some(job_id) = rx.recv().await {
            // `workers` is never closed, so acquiring only waits.
            let Ok(permit) = Arc::clone(&workers).acquire_owned().await else {
                break;
            };
            let task_tracker = tracker.clone();
            let task_renderer = Arc::clone(&renderer);
            let span = info_span!("render", job_id = %job_id);
            tokio::spawn(
                async move {
                    Self::execute(job_id, task_tracker, task_renderer).await;
                    drop(permit);
                }
                .instrument(span),
            );
        }

        // Every submission handle is gone and the queue is drained.
        debug!("render dispatcher stopped");
    }

    /// Drive one job from `Queued` to a terminal state.
    async fn execute(job_id: JobId, tracker: JobTracker, renderer: Arc<dyn Renderer>) {
        let Some(record) = tracker.mark_processing(&job_id).await else {
            debug!("job removed before rendering started");
            return;
        };

        let job = match RenderJob::from_record(&record) {
            Ok(job) => job,
            Err(e) => {
                warn!(error = %e, "scene rejected");
                tracker.fail(&job_id, e.to_string()).await;
                return;
            }
        };

        let reporter = tracker.reporter(&job_id);
        let outcome = tokio::spawn(async move { renderer.render(&job, &reporter).await }).await;

        match outcome {
            Ok(Ok(path)) => {
                if tracker.complete(&job_id, path.clone()).await {
                    info!(path = %path.display(), "job completed");
                } else {
                    // Deleted while rendering: nobody can reach this file now.
                    info!("job deleted during render; discarding output");
                    remove_artifact(&path).await;
                }
            }
            Ok(Err(e)) => {
                warn!(error = %e, "job failed");
                tracker.fail(&job_id, e.to_string()).await;
            }
            Err(join_err) => {
                let e = RenderError::Panicked(join_err.to_string());
                error!(error = %e, "render task aborted");
                tracker.fail(&job_id, e.to_string()).await;
            }
        }
    }
}
