//! Signed URL issuer.

use crate::traits::{Storage, StorageError, StorageResult};
use std::sync::Arc;
use std::time::Duration;

/// Mints time-limited GET URLs with the configured expiry.
///
/// Holds no state besides the store handle and the expiry. A key that does not exist
/// is refused instead of producing a URL that would 404.
#[derive(Clone)]
pub struct SignedUrlIssuer {
    storage: Arc<dyn Storage>,
    expires_in: Duration,
}

impl SignedUrlIssuer {
    pub fn new(storage: Arc<dyn Storage>, expires_in: Duration) -> Self {
        Self {
            storage,
            expires_in,
        }
    }

    pub fn expires_in(&self) -> Duration {
        self.expires_in
    }

    /// Every failure, including a missing key, is reported as `PresignFailed`.
    #[tracing::instrument(skip(self), fields(expires_secs = self.expires_in.as_secs()))]
    pub async fn presign(&self, key: &str) -> StorageResult<String> {
        let key = key.trim();
        if key.is_empty() {
            return Err(StorageError::PresignFailed("object key is empty".to_string()));
        }

        match self.storage.exists(key).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(StorageError::PresignFailed(format!(
                    "object '{}' does not exist",
                    key
                )))
            }
            Err(e) => return Err(StorageError::PresignFailed(e.to_string())),
        }

        let url = self
            .storage
            .presign_get(key, self.expires_in)
            .await
            .map_err(|e| match e {
                StorageError::PresignFailed(msg) => StorageError::PresignFailed(msg),
                other => StorageError::PresignFailed(other.to_string()),
            })?;

        tracing::debug!(key = %key, "Issued signed URL");
        Ok(url)
    }
}
