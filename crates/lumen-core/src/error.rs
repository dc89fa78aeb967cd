//! Error types module
//!
//! `AppError` is the caller-facing error taxonomy of the upload pipeline. Every
//! variant describes its own HTTP presentation through `ErrorMetadata`, so the API
//! layer never has to match on variants to build a response.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for degraded outcomes and unreadable media
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "UPLOAD_FAILED")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Encode error: {0}")]
    EncodeError(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Presign error: {0}")]
    PresignError(String),

    #[error("Stored {primary_key} but derivative failed during {stage}: {reason}")]
    PartialSuccess {
        primary_key: String,
        stage: String,
        reason: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::InvalidRequest(_) => (
            400,
            "INVALID_REQUEST",
            false,
            Some("Check uploadType and thumbnail parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::DecodeError(_) => (
            422,
            "DECODE_ERROR",
            false,
            Some("Check the media format and try a different file"),
            false,
            LogLevel::Warn,
        ),
        AppError::EncodeError(_) => (
            422,
            "ENCODE_ERROR",
            false,
            Some("Declare a supported image format"),
            false,
            LogLevel::Warn,
        ),
        AppError::UploadFailed(_) => (
            502,
            "UPLOAD_FAILED",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::PresignError(_) => (
            502,
            "PRESIGN_ERROR",
            true,
            Some("Verify the object key exists and retry"),
            true,
            LogLevel::Error,
        ),
        AppError::PartialSuccess { .. } => (
            207,
            "PARTIAL_SUCCESS",
            true,
            Some("The original was stored; retry to regenerate the thumbnail"),
            false,
            LogLevel::Warn,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the object key exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::PayloadTooLarge(_) => (
            413,
            "PAYLOAD_TOO_LARGE",
            false,
            Some("Reduce file size"),
            false,
            LogLevel::Debug,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::InvalidRequest(_) => "InvalidRequest",
            AppError::DecodeError(_) => "DecodeError",
            AppError::EncodeError(_) => "EncodeError",
            AppError::UploadFailed(_) => "UploadFailed",
            AppError::PresignError(_) => "PresignError",
            AppError::PartialSuccess { .. } => "PartialSuccess",
            AppError::NotFound(_) => "NotFound",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::Storage(_) => "Storage",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::InvalidRequest(ref msg) => msg.clone(),
            AppError::DecodeError(ref msg) => format!("Could not read media: {}", msg),
            AppError::EncodeError(ref msg) => format!("Could not encode thumbnail: {}", msg),
            AppError::UploadFailed(_) => "Failed to store upload".to_string(),
            AppError::PresignError(_) => "Failed to create signed URL".to_string(),
            AppError::PartialSuccess {
                ref primary_key,
                ref reason,
                ..
            } => format!(
                "Stored {} but thumbnail generation failed: {}",
                primary_key, reason
            ),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::PayloadTooLarge(ref msg) => msg.clone(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}
