//! Domain models for the upload-and-derivative pipeline.

pub mod dimension;
pub mod media;
pub mod upload;

pub use dimension::{Dimension, FrameWindow, ThumbnailSpec};
pub use media::{AccessPolicy, MediaCategory, MediaDescriptor};
pub use upload::{ObjectKey, UploadOutcome, UploadStage, UploadTimestamp};
