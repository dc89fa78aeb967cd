use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upload classification supplied by the caller as `video`, `photo`, or `file`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Video,
    Photo,
    #[serde(rename = "file")]
    GenericFile,
}

impl MediaCategory {
    /// Parse the caller's classification token.
    ///
    /// A missing or blank token and an unknown token are both `InvalidRequest`.
    pub fn parse(token: Option<&str>) -> Result<Self, AppError> {
        let token = token.map(str::trim).filter(|t| !t.is_empty()).ok_or_else(|| {
            AppError::InvalidRequest("upload type not specified".to_string())
        })?;
        token.parse()
    }

    /// Whether uploads of this category get a visual derivative.
    pub fn has_derivative(self) -> bool {
        matches!(self, MediaCategory::Video | MediaCategory::Photo)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaCategory::Video => "video",
            MediaCategory::Photo => "photo",
            MediaCategory::GenericFile => "file",
        }
    }
}

impl FromStr for MediaCategory {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "video" => Ok(MediaCategory::Video),
            "photo" => Ok(MediaCategory::Photo),
            "file" => Ok(MediaCategory::GenericFile),
            other => Err(AppError::InvalidRequest(format!(
                "upload type invalid '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied facts about one upload. Built once during validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDescriptor {
    pub file_name: String,
    /// MIME-like token such as `image/png`. May be absent or malformed.
    pub declared_format: Option<String>,
    /// Declared length in bytes when the caller knows it.
    pub byte_length: Option<u64>,
    pub category: MediaCategory,
}

impl MediaDescriptor {
    /// Content type to store the primary object under.
    pub fn content_type(&self) -> &str {
        self.declared_format
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or("application/octet-stream")
    }
}

/// Opaque access-control token passed through to the store unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessPolicy(String);

impl AccessPolicy {
    pub const PRIVATE: &'static str = "private";

    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Resolve an optional token, falling back to `private` when absent or blank.
    pub fn from_optional(token: Option<&str>) -> Self {
        match token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => Self(t.to_string()),
            None => {
                tracing::warn!("no access policy supplied, defaulting to private");
                Self::default()
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self(Self::PRIVATE.to_string())
    }
}

impl fmt::Display for AccessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
