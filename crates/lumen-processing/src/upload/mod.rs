//! Upload orchestration: validate, store, presign, derive, store the derivative.

pub mod pipeline;
pub mod types;

pub use pipeline::{DerivativeGenerators, UploadOrchestrator};
pub use types::{UploadRequest, ValidatedUpload};
