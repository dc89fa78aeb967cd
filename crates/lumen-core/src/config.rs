//! Configuration loaded once at startup.
//!
//! `Config::from_env()` reads `.env` (best effort) and the process environment and
//! produces an immutable value. Everything downstream receives it by `Arc<Config>`;
//! nothing reads the environment after startup.

use crate::models::{FrameWindow, MediaCategory, ThumbnailSpec};
use crate::StorageBackend;
use anyhow::{anyhow, Result};
use std::env;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_PRESIGN_DURATION_MINUTES: u64 = 60;
const DEFAULT_THUMBNAIL_SIZE: u32 = 200;
/// S3 rejects multipart parts under 5 MiB except the last one.
const DEFAULT_MULTIPART_MIN_PART_SIZE: usize = 5 * 1024 * 1024;
const DEFAULT_MAX_UPLOAD_SIZE_MB: usize = 500;
const DEFAULT_MAX_CONCURRENT_UPLOADS: usize = 64;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub environment: String,
    pub max_upload_size_bytes: usize,
    /// Uploads processed at once; further requests wait.
    pub max_concurrent_uploads: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            environment: "development".to_string(),
            max_upload_size_bytes: DEFAULT_MAX_UPLOAD_SIZE_MB * 1024 * 1024,
            max_concurrent_uploads: DEFAULT_MAX_CONCURRENT_UPLOADS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub bucket: Option<String>,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible providers (MinIO, Spaces).
    pub endpoint: Option<String>,
    pub local_path: Option<String>,
    pub presign_duration: Duration,
    pub multipart_min_part_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::S3,
            bucket: None,
            region: None,
            endpoint: None,
            local_path: None,
            presign_duration: Duration::from_secs(DEFAULT_PRESIGN_DURATION_MINUTES * 60),
            multipart_min_part_size: DEFAULT_MULTIPART_MIN_PART_SIZE,
        }
    }
}

/// Key namespaces per upload classification.
#[derive(Debug, Clone)]
pub struct PathConfig {
    pub root_path: String,
    pub video_path: String,
    pub photo_path: String,
    pub file_path: String,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            root_path: String::new(),
            video_path: "videos/".to_string(),
            photo_path: "photos/".to_string(),
            file_path: "files/".to_string(),
        }
    }
}

impl PathConfig {
    /// Prefix for a classification: `{root}{category path}`.
    pub fn category_prefix(&self, category: MediaCategory) -> String {
        let path = match category {
            MediaCategory::Video => &self.video_path,
            MediaCategory::Photo => &self.photo_path,
            MediaCategory::GenericFile => &self.file_path,
        };
        format!("{}{}", self.root_path, path)
    }
}

#[derive(Debug, Clone)]
pub struct DerivativeConfig {
    pub thumbnail: ThumbnailSpec,
    pub frame_window: FrameWindow,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

impl Default for DerivativeConfig {
    fn default() -> Self {
        Self {
            thumbnail: ThumbnailSpec::new(DEFAULT_THUMBNAIL_SIZE, DEFAULT_THUMBNAIL_SIZE),
            frame_window: FrameWindow::default(),
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub paths: PathConfig,
    pub derivative: DerivativeConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| anyhow!("PORT must be a valid number"))?,
            None => defaults.server.port,
        };

        let max_upload_size_mb = parse_or(&lookup, "MAX_UPLOAD_SIZE_MB", DEFAULT_MAX_UPLOAD_SIZE_MB);
        let max_upload_size_bytes = max_upload_size_mb
            .checked_mul(1024 * 1024)
            .unwrap_or_else(|| {
                warn_out_of_range("MAX_UPLOAD_SIZE_MB", max_upload_size_mb);
                DEFAULT_MAX_UPLOAD_SIZE_MB * 1024 * 1024
            });

        let presign_minutes = parse_or(
            &lookup,
            "PRESIGN_DURATION_MINUTES",
            DEFAULT_PRESIGN_DURATION_MINUTES,
        );
        let presign_secs = presign_minutes.checked_mul(60).unwrap_or_else(|| {
            warn_out_of_range("PRESIGN_DURATION_MINUTES", presign_minutes);
            DEFAULT_PRESIGN_DURATION_MINUTES * 60
        });

        let server = ServerConfig {
            port,
            environment: lookup("ENVIRONMENT").unwrap_or(defaults.server.environment),
            max_upload_size_bytes,
            max_concurrent_uploads: parse_or(
                &lookup,
                "MAX_CONCURRENT_UPLOADS",
                DEFAULT_MAX_CONCURRENT_UPLOADS,
            )
            .max(1),
        };

        let backend = match lookup("STORAGE_BACKEND") {
            Some(raw) => raw.parse::<StorageBackend>()?,
            None => StorageBackend::S3,
        };

        let storage = StorageConfig {
            backend,
            bucket: lookup("S3_BUCKET").filter(|s| !s.trim().is_empty()),
            region: lookup("S3_REGION").or_else(|| lookup("AWS_REGION")),
            endpoint: lookup("S3_ENDPOINT").filter(|s| !s.trim().is_empty()),
            local_path: lookup("LOCAL_STORAGE_PATH").filter(|s| !s.trim().is_empty()),
            presign_duration: Duration::from_secs(presign_secs),
            multipart_min_part_size: parse_or(
                &lookup,
                "MULTIPART_MIN_PART_SIZE",
                DEFAULT_MULTIPART_MIN_PART_SIZE,
            ),
        };

        match storage.backend {
            StorageBackend::S3 if storage.bucket.is_none() => {
                return Err(anyhow!("S3_BUCKET must be set when STORAGE_BACKEND=s3"));
            }
            StorageBackend::Local if storage.local_path.is_none() => {
                return Err(anyhow!(
                    "LOCAL_STORAGE_PATH must be set when STORAGE_BACKEND=local"
                ));
            }
            _ => {}
        }

        let paths = PathConfig {
            root_path: lookup("ROOT_PATH").unwrap_or(defaults.paths.root_path),
            video_path: lookup("VIDEO_PATH").unwrap_or(defaults.paths.video_path),
            photo_path: lookup("PHOTO_PATH").unwrap_or(defaults.paths.photo_path),
            file_path: lookup("FILE_PATH").unwrap_or(defaults.paths.file_path),
        };

        let default_window = defaults.derivative.frame_window;
        let derivative = DerivativeConfig {
            thumbnail: ThumbnailSpec::new(
                parse_or(&lookup, "THUMBNAIL_WIDTH", DEFAULT_THUMBNAIL_SIZE),
                parse_or(&lookup, "THUMBNAIL_HEIGHT", DEFAULT_THUMBNAIL_SIZE),
            ),
            frame_window: FrameWindow {
                start: parse_or(&lookup, "GIF_START_FRAME", default_window.start),
                count: parse_or(&lookup, "GIF_FRAME_COUNT", default_window.count),
                frame_rate: parse_or(&lookup, "GIF_FRAME_RATE", default_window.frame_rate).max(1),
                sample_stride: parse_or(
                    &lookup,
                    "GIF_SAMPLE_STRIDE",
                    default_window.sample_stride,
                )
                .max(1),
            },
            ffmpeg_path: lookup("FFMPEG_PATH").unwrap_or(defaults.derivative.ffmpeg_path),
            ffprobe_path: lookup("FFPROBE_PATH").unwrap_or(defaults.derivative.ffprobe_path),
        };

        Ok(Config {
            server,
            storage,
            paths,
            derivative,
        })
    }

    pub fn is_production(&self) -> bool {
        let env = self.server.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(variable = name, value = %raw, "Invalid value, using default");
            default
        }),
        None => default,
    }
}

fn warn_out_of_range(name: &str, value: impl std::fmt::Display) {
    tracing::warn!(variable = name, value = %value, "Value out of range, using default");
}
