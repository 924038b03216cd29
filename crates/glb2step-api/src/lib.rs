//! # glb2step-api
//!
//! HTTP surface of glb2step: `POST /convert` accepts a GLB upload and
//! returns the zipped STEP, `GET /health` reports liveness and counters.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
