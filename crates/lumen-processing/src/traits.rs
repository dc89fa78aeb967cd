//! Derivative generator trait

use crate::error::ProcessingError;
use async_trait::async_trait;
use bytes::Bytes;
use lumen_core::{Dimension, MediaCategory};

/// Inputs shared by every derivative generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivativeRequest {
    /// Box the derivative must fit inside.
    pub bound: Dimension,
    /// Declared format of the primary object, e.g. `image/png`.
    pub declared_format: Option<String>,
}

/// Encoded derivative ready to be stored.
#[derive(Debug, Clone)]
pub struct Derivative {
    pub bytes: Bytes,
    /// Extension for the derivative key.
    pub extension: String,
    pub content_type: String,
}

/// Which generator a classification uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivativeKind {
    /// Scaled still image in the declared format.
    Thumbnail,
    /// Animated GIF sampled from a video.
    Animation,
}

impl DerivativeKind {
    /// `None` for classifications that get no derivative.
    pub fn for_category(category: MediaCategory) -> Option<Self> {
        match category {
            MediaCategory::Photo => Some(DerivativeKind::Thumbnail),
            MediaCategory::Video => Some(DerivativeKind::Animation),
            MediaCategory::GenericFile => None,
        }
    }
}

/// Produces a derivative from a source readable at a signed URL.
#[async_trait]
pub trait DerivativeGenerator: Send + Sync {
    async fn generate(
        &self,
        source_url: &str,
        request: &DerivativeRequest,
    ) -> Result<Derivative, ProcessingError>;
}
