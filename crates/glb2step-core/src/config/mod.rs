//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section, and every field has a default so an empty file is valid.

pub mod app;
pub mod conversion;
pub mod logging;
pub mod storage;

use std::path::Path;

use serde::{Deserialize, Serialize};
use validator::Validate;

use self::app::ServerConfig;
use self::conversion::ConversionConfig;
use self::logging::LoggingConfig;
use self::storage::StorageConfig;

use crate::error::AppError;
use crate::result::AppResult;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay) and the
/// `GLB2STEP__`-prefixed environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server settings.
    #[validate(nested)]
    pub server: ServerConfig,
    /// Job storage settings.
    pub storage: StorageConfig,
    /// External tool and packaging settings.
    #[validate(nested)]
    pub conversion: ConversionConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from `config/default.toml` and `config/{env}.toml`.
    pub fn load(env: &str) -> AppResult<Self> {
        Self::load_from(Path::new("config"), env)
    }

    /// Load configuration from the given directory.
    ///
    /// Both files are optional. Environment variables such as
    /// `GLB2STEP__STORAGE__ROOT` override file values.
    pub fn load_from(dir: &Path, env: &str) -> AppResult<Self> {
        let default_file = dir.join("default");
        let env_file = dir.join(env);

        let config = config::Config::builder()
            .add_source(
                config::File::with_name(&default_file.to_string_lossy()).required(false),
            )
            .add_source(config::File::with_name(&env_file.to_string_lossy()).required(false))
            .add_source(
                config::Environment::with_prefix("GLB2STEP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let app: AppConfig = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        app.validate()?;
        Ok(app)
    }
}
