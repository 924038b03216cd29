//! # glb2step-core
//!
//! Core crate for glb2step. Contains the configuration schemas and the
//! unified error system shared by the pipeline and HTTP crates.
//!
//! This crate has **no** internal dependencies on other glb2step crates.

pub mod config;
pub mod error;
pub mod result;

pub use error::AppError;
pub use result::AppResult;
