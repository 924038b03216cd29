//! Artifact roles, pipeline stages and the deliverable returned to callers.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Suffix accepted for uploads (compared case-insensitively).
pub const GLB_EXTENSION: &str = ".glb";

/// Whether an uploaded file name is a GLB asset.
pub fn is_glb_file_name(file_name: &str) -> bool {
    file_name.to_lowercase().ends_with(GLB_EXTENSION)
}

/// The fixed role of a file inside a job directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactRole {
    /// Uploaded GLB.
    Input,
    /// OBJ produced by the asset-conversion tool.
    Intermediate,
    /// STEP produced by the CAD kernel.
    Output,
    /// ZIP wrapping the STEP.
    Package,
}

impl ArtifactRole {
    /// File name of this artifact inside the job directory.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Input => "input.glb",
            Self::Intermediate => "intermediate.obj",
            Self::Output => "output.step",
            Self::Package => "output.zip",
        }
    }
}

/// An external-process stage of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// GLB → OBJ through the asset-conversion tool.
    AssetConversion,
    /// OBJ → STEP through the CAD kernel batch runner.
    CadExport,
}

impl Stage {
    /// Reason recorded when the pipeline fails in this stage.
    pub fn failure_reason(self) -> &'static str {
        match self {
            Self::AssetConversion => "conversion-error",
            Self::CadExport => "cad-error",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AssetConversion => write!(f, "Asset conversion"),
            Self::CadExport => write!(f, "CAD export"),
        }
    }
}

/// Where a job currently is in the conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Input stored, nothing run yet.
    Received,
    /// OBJ intermediate present.
    ConvertedObj,
    /// STEP output present.
    ConvertedStep,
    /// Deliverable chosen (ZIP or raw STEP).
    Packaged,
    /// Ready to return.
    Done,
    /// Absorbing failure state.
    Failed(&'static str),
}

/// How the deliverable is packaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageKind {
    /// Deflated ZIP containing `converted.step`.
    Zip,
    /// Uncompressed STEP, used when compression failed.
    RawStep,
}

impl PackageKind {
    /// Media type of the HTTP response body.
    pub fn media_type(self) -> &'static str {
        match self {
            Self::Zip => "application/zip",
            Self::RawStep => "application/octet-stream",
        }
    }

    /// File name offered to the client.
    pub fn download_name(self) -> &'static str {
        match self {
            Self::Zip => "converted.zip",
            Self::RawStep => "converted.step",
        }
    }
}

/// The single artifact a finished job returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deliverable {
    /// Path of the package or, on fallback, of the STEP output.
    pub path: PathBuf,
    /// Packaging used.
    pub kind: PackageKind,
    /// Size of the file at `path`.
    pub size: u64,
    /// Face counts reported by the CAD kernel, when it printed them.
    pub report: Option<crate::scripting::CadReport>,
}
