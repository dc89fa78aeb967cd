//! Lumen API Library
//!
//! The HTTP surface over the upload orchestrator: routes, handlers, error responses,
//! telemetry, and server startup.

pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;
pub mod telemetry;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
