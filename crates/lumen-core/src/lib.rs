//! Lumen Core Library
//!
//! Domain models, the error taxonomy, and the immutable configuration shared by the
//! storage, processing, and API crates.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{Config, DerivativeConfig, PathConfig, ServerConfig, StorageConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    AccessPolicy, Dimension, FrameWindow, MediaCategory, MediaDescriptor, ObjectKey,
    ThumbnailSpec, UploadOutcome, UploadStage, UploadTimestamp,
};
pub use storage_types::StorageBackend;
