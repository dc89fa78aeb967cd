use crate::traits::{ByteStream, PutReceipt, Storage, StorageError, StorageResult, UploadMetadata};
use crate::StorageBackend;
use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage implementation
///
/// Objects are plain files under `base_path`; the key is the relative path. Signed
/// URLs are `file://` URLs, which the derivative generators can read directly.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage instance rooted at `base_path`, creating it if needed.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        let base_path = base_path.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;

        Ok(LocalStorage { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Convert a storage key to a filesystem path, rejecting anything that could
    /// resolve outside the base directory.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty()
            || key.starts_with('/')
            || key.contains('\\')
            || key.split('/').any(|segment| segment == "..")
        {
            return Err(StorageError::InvalidKey(format!(
                "Storage key '{}' contains invalid characters",
                key
            )));
        }

        Ok(self.base_path.join(key))
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn write_stream(&self, path: &Path, mut body: ByteStream<'_>) -> std::io::Result<u64> {
        let mut file = fs::File::create(path).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.sync_all().await?;
        Ok(written)
    }

    fn path_to_key(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.base_path).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .collect();
        Some(parts.join("/"))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put_stream(
        &self,
        key: &str,
        body: ByteStream<'_>,
        metadata: &UploadMetadata,
    ) -> StorageResult<PutReceipt> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        self.ensure_parent_dir(&path).await?;

        let size = match self.write_stream(&path, body).await {
            Ok(size) => size,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    path = %path.display(),
                    key = %key,
                    "Local storage stream upload failed"
                );
                // Leave no truncated object behind.
                let _ = fs::remove_file(&path).await;
                return Err(StorageError::UploadFailed(format!(
                    "Failed to write {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            content_type = %metadata.content_type,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage stream upload successful"
        );

        Ok(PutReceipt {
            key: key.to_string(),
            size_bytes: size,
            e_tag: None,
        })
    }

    async fn presign_get(&self, key: &str, _expires_in: Duration) -> StorageResult<String> {
        let path = self.key_to_path(key)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(format!("file://{}", path.display()))
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let start = std::time::Instant::now();
        let mut keys = Vec::new();
        let mut pending = vec![self.base_path.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::ListFailed(e.to_string())),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StorageError::ListFailed(e.to_string()))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| StorageError::ListFailed(e.to_string()))?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if let Some(key) = self.path_to_key(&path) {
                    if key.starts_with(prefix) {
                        keys.push(key);
                    }
                }
            }
        }

        keys.sort();

        tracing::info!(
            prefix = %prefix,
            count = keys.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage list successful"
        );

        Ok(keys)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
