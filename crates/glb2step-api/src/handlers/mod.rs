//! Request handlers.

pub mod convert;
pub mod health;
