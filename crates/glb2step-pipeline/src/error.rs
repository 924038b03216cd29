//! Unified error type for the conversion pipeline.
//!
//! Workspace, process and packaging failures are consolidated into a single
//! `ConversionError` enum that maps cleanly to `glb2step_core::error::AppError`.

use std::path::PathBuf;

use glb2step_core::error::AppError;
use thiserror::Error;

use crate::models::Stage;

/// Failures allocating a job directory.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// The storage root is missing or not writable.
    #[error("Storage root {root} is not writable: {source}")]
    Unavailable {
        /// The configured storage root.
        root: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A directory for the freshly generated job id already exists.
    #[error("Job directory already exists: {path}")]
    Collision {
        /// The colliding directory.
        path: PathBuf,
    },
}

/// Unified error type for all conversion operations.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Job directory could not be allocated.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    /// The stage's command could not be started.
    #[error("{stage} could not start '{command}': {source}")]
    LaunchFailed {
        /// Failing stage.
        stage: Stage,
        /// Program that was executed.
        command: String,
        /// Spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The stage's process exited with a non-zero status.
    #[error("{stage} failed with exit code {code}")]
    StageFailed {
        /// Failing stage.
        stage: Stage,
        /// Exit code (`-1` when killed by a signal).
        code: i32,
        /// Captured stdout.
        stdout: String,
        /// Captured stderr.
        stderr: String,
    },

    /// The stage's process exceeded its timeout and was killed.
    #[error("{stage} timed out after {timeout_seconds}s")]
    StageTimedOut {
        /// Failing stage.
        stage: Stage,
        /// The timeout that was exceeded.
        timeout_seconds: u64,
    },

    /// The process reported success but its artifact is absent or empty.
    #[error("{stage} produced no output: {path}")]
    OutputMissing {
        /// Failing stage.
        stage: Stage,
        /// Expected artifact path.
        path: PathBuf,
    },

    /// The CAD kernel loaded a mesh with zero facets.
    #[error(
        "CAD export failed: no mesh data found in the intermediate OBJ (exit code {})",
        crate::scripting::EXIT_EMPTY_MESH
    )]
    EmptyMesh {
        /// Captured stdout.
        stdout: String,
        /// Captured stderr.
        stderr: String,
    },

    /// Every face of the mesh failed to build.
    #[error(
        "CAD export failed: no valid faces could be built from the mesh (exit code {})",
        crate::scripting::EXIT_NO_VALID_FACES
    )]
    NoValidFaces {
        /// Captured stdout.
        stdout: String,
        /// Captured stderr.
        stderr: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP library error.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// CAD request serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConversionError {
    /// Reason recorded by the pipeline's `Failed` state.
    pub fn failure_reason(&self) -> &'static str {
        match self {
            Self::Workspace(_) => "workspace-error",
            Self::LaunchFailed { stage, .. }
            | Self::StageFailed { stage, .. }
            | Self::StageTimedOut { stage, .. }
            | Self::OutputMissing { stage, .. } => stage.failure_reason(),
            Self::EmptyMesh { .. } | Self::NoValidFaces { .. } => Stage::CadExport.failure_reason(),
            Self::Zip(_) => "package-error",
            Self::Io(_) | Self::Json(_) => "io-error",
        }
    }

    /// Whether the error is a stage timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::StageTimedOut { .. })
    }

    /// Message for the caller, optionally carrying the tool's captured output.
    pub fn detail(&self, expose_diagnostics: bool) -> String {
        let summary = self.to_string();
        if !expose_diagnostics {
            return summary;
        }

        let (stdout, stderr) = match self {
            Self::StageFailed { stdout, stderr, .. }
            | Self::EmptyMesh { stdout, stderr }
            | Self::NoValidFaces { stdout, stderr } => (stdout.as_str(), stderr.as_str()),
            _ => return summary,
        };

        let mut detail = summary;
        if !stdout.is_empty() {
            detail.push_str("\nStdout: ");
            detail.push_str(stdout);
        }
        if !stderr.is_empty() {
            detail.push_str("\nStderr: ");
            detail.push_str(stderr);
        }
        detail
    }

    /// Convert into an `AppError`, choosing whether diagnostics are exposed.
    pub fn into_app_error(self, expose_diagnostics: bool) -> AppError {
        let message = self.detail(expose_diagnostics);
        match self {
            Self::Workspace(e) => AppError::with_source(
                glb2step_core::error::ErrorKind::Storage,
                message,
                e,
            ),
            Self::Io(e) => {
                AppError::with_source(glb2step_core::error::ErrorKind::Storage, message, e)
            }
            Self::Json(e) => AppError::with_source(
                glb2step_core::error::ErrorKind::Serialization,
                message,
                e,
            ),
            _ => AppError::external(message),
        }
    }
}

impl From<ConversionError> for AppError {
    fn from(err: ConversionError) -> Self {
        err.into_app_error(false)
    }
}
