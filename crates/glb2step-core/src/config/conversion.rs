//! External tool configuration for the GLB → OBJ → STEP pipeline.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Commands, timeouts and packaging settings for the conversion pipeline.
///
/// The commands are resolved through `PATH` unless an absolute path is
/// given.
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Asset-conversion tool, invoked as `<cmd> export <in> <out>`.
    pub converter_command: String,

    /// Timeout for the GLB → OBJ stage.
    #[validate(range(min = 1, max = 3600))]
    pub converter_timeout_seconds: u64,

    /// CAD kernel batch runner, invoked as `<cmd> -c <script>`.
    pub cad_command: String,

    /// Timeout for the OBJ → STEP stage.
    #[validate(range(min = 1, max = 7200))]
    pub cad_timeout_seconds: u64,

    /// X display handed to the CAD kernel.
    pub display: String,

    /// Deflate level used for the ZIP package.
    #[validate(range(min = 0, max = 9))]
    pub compression_level: i64,

    /// Minimum size in bytes for an artifact to count as present.
    #[validate(range(min = 1))]
    pub min_output_bytes: u64,

    /// Embed tool exit code, stdout and stderr in error responses.
    pub expose_diagnostics: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            converter_command: "assimp".to_string(),
            converter_timeout_seconds: 60,
            cad_command: "FreeCADCmd".to_string(),
            cad_timeout_seconds: 300,
            display: ":99".to_string(),
            compression_level: 9,
            min_output_bytes: 1,
            expose_diagnostics: true,
        }
    }
}
