//! Application state shared across all handlers.

use std::sync::Arc;
use std::time::Instant;

use glb2step_core::config::AppConfig;
use glb2step_pipeline::{ConversionPipeline, JobWorkspace};

/// Shared application state, injected via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Allocates per-request job directories.
    pub workspace: JobWorkspace,
    /// Runs the conversion stages.
    pub pipeline: ConversionPipeline,
    /// Process start, for uptime reporting.
    pub started_at: Instant,
}

impl AppState {
    /// Build the state from configuration.
    pub fn new(config: AppConfig) -> Self {
        let workspace = JobWorkspace::new(config.storage.root.clone(), config.storage.retain_jobs);
        let pipeline = ConversionPipeline::new(config.conversion.clone());
        Self {
            config: Arc::new(config),
            workspace,
            pipeline,
            started_at: Instant::now(),
        }
    }
}
