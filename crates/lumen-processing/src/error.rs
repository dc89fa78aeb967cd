use lumen_core::AppError;
use thiserror::Error;

/// Errors raised while producing a derivative.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Source bytes could not be decoded, or a video yielded no usable frames.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The target format is unsupported or the encoder failed.
    #[error("Encode error: {0}")]
    Encode(String),

    /// The source URL could not be read.
    #[error("Failed to fetch source: {0}")]
    Fetch(String),

    /// A blocking worker panicked or was cancelled.
    #[error("Processing task failed: {0}")]
    Task(String),
}

impl From<ProcessingError> for AppError {
    fn from(err: ProcessingError) -> Self {
        match err {
            ProcessingError::Decode(msg) => AppError::DecodeError(msg),
            ProcessingError::Encode(msg) => AppError::EncodeError(msg),
            // A source we just presigned should always be readable.
            ProcessingError::Fetch(msg) => AppError::DecodeError(format!("source unreadable: {}", msg)),
            ProcessingError::Task(msg) => AppError::Internal(msg),
        }
    }
}

impl From<tokio::task::JoinError> for ProcessingError {
    fn from(err: tokio::task::JoinError) -> Self {
        ProcessingError::Task(err.to_string())
    }
}
