//! Convenience result type alias for glb2step.

use crate::error::AppError;

/// A specialized `Result` type for glb2step operations.
pub type AppResult<T> = Result<T, AppError>;
