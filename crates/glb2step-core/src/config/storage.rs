//! Job storage configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where job directories live and how long they are kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory holding one subdirectory per job.
    pub root: PathBuf,
    /// Keep job directories after the response is sent (debugging aid).
    pub retain_jobs: bool,
    /// Directories older than this are swept at startup.
    pub stale_job_minutes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/storage"),
            retain_jobs: false,
            stale_job_minutes: 60,
        }
    }
}
