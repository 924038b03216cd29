//! # glb2step-pipeline
//!
//! Converts an uploaded GLB into a zipped STEP file by driving two external
//! tools: `assimp` (GLB → OBJ) and `FreeCADCmd` (OBJ → STEP). The crate owns
//! the per-request job directory, the process runner with its timeouts, the
//! request handed to the CAD kernel, and the final packaging step. All
//! geometry work happens inside the external tools.

pub mod error;
pub mod executor;
pub mod metrics;
pub mod models;
pub mod packaging;
pub mod pipeline;
pub mod scripting;
pub mod workspace;

pub use error::{ConversionError, WorkspaceError};
pub use executor::{StageCommand, StageResult, StageRunner};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use models::{ArtifactRole, Deliverable, PackageKind, PipelineState, Stage};
pub use pipeline::ConversionPipeline;
pub use scripting::{CadReport, CadRequest};
pub use workspace::{Job, JobWorkspace};
