//! Storage abstraction trait
//!
//! This module defines the `Storage` trait that every backend implements. The
//! pipeline only needs streaming put, presigned GET, prefix listing, and delete.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use lumen_core::AccessPolicy;
use std::collections::BTreeMap;
use std::io;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("List failed: {0}")]
    ListFailed(String),

    #[error("Presign failed: {0}")]
    PresignFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Body of a streamed write. Chunks arrive in order; an `Err` item aborts the write.
pub type ByteStream<'a> = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + 'a>>;

/// Wrap an in-memory buffer as a single-chunk `ByteStream`.
pub fn bytes_stream(data: impl Into<Bytes>) -> ByteStream<'static> {
    let data: Bytes = data.into();
    Box::pin(futures::stream::once(async move { Ok(data) }))
}

/// Metadata attached to a put.
#[derive(Debug, Clone, Default)]
pub struct UploadMetadata {
    pub content_type: String,
    /// Declared length; backends record it but always trust the bytes actually written.
    pub content_length: Option<u64>,
    pub access_policy: AccessPolicy,
    /// User metadata stored alongside the object (`x-amz-meta-*` on S3).
    pub user_metadata: BTreeMap<String, String>,
}

impl UploadMetadata {
    pub fn new(content_type: impl Into<String>, access_policy: AccessPolicy) -> Self {
        Self {
            content_type: content_type.into(),
            access_policy,
            ..Default::default()
        }
    }

    pub fn with_content_length(mut self, content_length: Option<u64>) -> Self {
        self.content_length = content_length;
        self
    }
}

/// Acknowledgement of a durable write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutReceipt {
    pub key: String,
    pub size_bytes: u64,
    pub e_tag: Option<String>,
}

/// Storage abstraction trait
///
/// A put either returns a `PutReceipt` once the backend has acknowledged the write,
/// or fails with `StorageError::UploadFailed`. No backend retries internally.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Stream `body` to `key`, consuming it until EOF.
    async fn put_stream(
        &self,
        key: &str,
        body: ByteStream<'_>,
        metadata: &UploadMetadata,
    ) -> StorageResult<PutReceipt>;

    /// Write an in-memory buffer to `key`.
    async fn put_bytes(
        &self,
        key: &str,
        data: Bytes,
        metadata: &UploadMetadata,
    ) -> StorageResult<PutReceipt> {
        self.put_stream(key, bytes_stream(data), metadata).await
    }

    /// Generate a time-limited GET URL for `key`.
    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String>;

    /// List every key under `prefix`.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Delete a single object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Check if an object exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
