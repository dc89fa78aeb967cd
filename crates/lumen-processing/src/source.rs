//! Reads derivative sources from signed URLs.

use crate::error::ProcessingError;
use bytes::Bytes;
use std::time::Duration;

/// Upper bound on a single source download.
pub const SOURCE_FETCH_TIMEOUT: Duration = Duration::from_secs(120);

const FILE_SCHEME: &str = "file://";

/// Where a signed URL points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Remote(String),
    Local(std::path::PathBuf),
}

impl SourceLocation {
    /// Accept `http(s)://` and `file://` URLs only.
    pub fn parse(url: &str) -> Result<Self, ProcessingError> {
        if let Some(path) = url.strip_prefix(FILE_SCHEME) {
            if path.is_empty() {
                return Err(ProcessingError::Fetch("empty file URL".to_string()));
            }
            return Ok(SourceLocation::Local(path.into()));
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(SourceLocation::Remote(url.to_string()));
        }
        Err(ProcessingError::Fetch(format!(
            "unsupported source URL scheme: {}",
            url.split(':').next().unwrap_or_default()
        )))
    }

    /// Input argument for ffmpeg/ffprobe.
    pub fn as_input(&self) -> String {
        match self {
            SourceLocation::Remote(url) => url.clone(),
            SourceLocation::Local(path) => path.display().to_string(),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, SourceLocation::Remote(_))
    }
}

/// HTTP client for source downloads, plus direct reads for `file://` sources.
#[derive(Clone)]
pub struct SourceFetcher {
    client: reqwest::Client,
}

impl SourceFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ProcessingError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProcessingError::Fetch(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Read the full body behind `url`.
    pub async fn fetch(&self, url: &str) -> Result<Bytes, ProcessingError> {
        match SourceLocation::parse(url)? {
            SourceLocation::Local(path) => tokio::fs::read(&path)
                .await
                .map(Bytes::from)
                .map_err(|e| ProcessingError::Fetch(format!("{}: {}", path.display(), e))),
            SourceLocation::Remote(url) => {
                let response = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| ProcessingError::Fetch(e.to_string()))?;

                let status = response.status();
                if !status.is_success() {
                    return Err(ProcessingError::Fetch(format!(
                        "source responded with HTTP {}",
                        status
                    )));
                }

                response
                    .bytes()
                    .await
                    .map_err(|e| ProcessingError::Fetch(e.to_string()))
            }
        }
    }
}
