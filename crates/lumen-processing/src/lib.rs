//! Lumen Media Processing Library
//!
//! Derivative generation and the upload orchestrator: the dimension scaler, the photo
//! thumbnail generator, the animated GIF generator over ffmpeg-decoded frames, and the
//! pipeline that sequences store, presign, derive, and store again.

pub mod error;
pub mod format;
pub mod traits;
pub mod upload;

#[cfg(feature = "image")]
pub mod image;
#[cfg(feature = "image")]
pub mod source;
#[cfg(feature = "video")]
pub mod video;

// Re-export commonly used types
pub use error::ProcessingError;
pub use traits::{Derivative, DerivativeGenerator, DerivativeKind, DerivativeRequest};
pub use upload::{DerivativeGenerators, UploadOrchestrator, UploadRequest, ValidatedUpload};

#[cfg(feature = "image")]
pub use crate::image::{scale, PhotoDerivativeGenerator};
#[cfg(feature = "image")]
pub use crate::source::SourceFetcher;
#[cfg(feature = "video")]
pub use crate::video::{AnimatedDerivativeGenerator, FfmpegFrameSource, FrameSource, VideoProbe};
