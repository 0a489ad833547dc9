//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use animo_core::{Dispatcher, DispatcherConfig, JobTracker, Renderer};

use crate::config::Config;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// In-memory job records.
    pub jobs: JobTracker,
    /// Queues new jobs for rendering.
    pub dispatcher: Dispatcher,
    /// Used by the health probe.
    pub renderer: Arc<dyn Renderer>,
}

impl AppState {
    /// Create the job store and start the render dispatcher.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: Config, renderer: Arc<dyn Renderer>) -> Self {
        let dispatcher = Dispatcher::start(
            JobTracker::new(),
            Arc::clone(&renderer),
            DispatcherConfig {
                queue_capacity: config.queue_capacity,
                max_concurrent: config.max_concurrent_renders,
            },
        );
        Self {
            config: Arc::new(config),
            jobs: dispatcher.tracker().clone(),
            dispatcher,
            renderer,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}
