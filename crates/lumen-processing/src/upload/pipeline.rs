//! Upload pipeline: validate → store → presign → derive → store derivative.
//!
//! The primary object is stored before anything else happens to it. Once it is durable
//! the upload cannot fail as a whole: a failing derivative stage produces
//! `UploadOutcome::PartialSuccess` and the primary object stays in place.

use std::sync::Arc;

use lumen_core::{
    AccessPolicy, AppError, Config, MediaCategory, MediaDescriptor, ObjectKey, ThumbnailSpec,
    UploadOutcome, UploadStage, UploadTimestamp,
};
use lumen_storage::{
    derivative_key, primary_key, upload_prefix, ByteStream, SignedUrlIssuer, Storage,
    StorageError, UploadMetadata,
};

use super::types::{UploadRequest, ValidatedUpload};
use crate::format::file_extension;
use crate::traits::{DerivativeGenerator, DerivativeKind, DerivativeRequest};

/// One generator per derivative kind.
#[derive(Clone)]
pub struct DerivativeGenerators {
    pub thumbnail: Arc<dyn DerivativeGenerator>,
    pub animation: Arc<dyn DerivativeGenerator>,
}

impl DerivativeGenerators {
    pub fn new(
        thumbnail: Arc<dyn DerivativeGenerator>,
        animation: Arc<dyn DerivativeGenerator>,
    ) -> Self {
        Self {
            thumbnail,
            animation,
        }
    }

    /// Photo thumbnails over HTTP/file sources, GIFs via the configured ffmpeg binaries.
    #[cfg(feature = "video")]
    pub fn from_config(config: &Config) -> Result<Self, crate::ProcessingError> {
        use crate::image::PhotoDerivativeGenerator;
        use crate::source::{SourceFetcher, SOURCE_FETCH_TIMEOUT};
        use crate::video::AnimatedDerivativeGenerator;

        let fetcher = SourceFetcher::new(SOURCE_FETCH_TIMEOUT)?;
        let derivative = &config.derivative;
        Ok(Self::new(
            Arc::new(PhotoDerivativeGenerator::new(fetcher)),
            Arc::new(AnimatedDerivativeGenerator::new(
                derivative.ffmpeg_path.clone(),
                derivative.ffprobe_path.clone(),
                derivative.frame_window,
            )),
        ))
    }

    pub fn for_kind(&self, kind: DerivativeKind) -> &Arc<dyn DerivativeGenerator> {
        match kind {
            DerivativeKind::Thumbnail => &self.thumbnail,
            DerivativeKind::Animation => &self.animation,
        }
    }
}

/// A derivative stage failure, carried until it is folded into a partial success.
struct StageFailure {
    stage: UploadStage,
    error: AppError,
}

impl StageFailure {
    fn new(stage: UploadStage, error: impl Into<AppError>) -> Self {
        Self {
            stage,
            error: error.into(),
        }
    }
}

/// Sequences one upload end to end. Holds no per-request state.
#[derive(Clone)]
pub struct UploadOrchestrator {
    config: Arc<Config>,
    storage: Arc<dyn Storage>,
    signer: SignedUrlIssuer,
    generators: DerivativeGenerators,
}

impl UploadOrchestrator {
    pub fn new(
        config: Arc<Config>,
        storage: Arc<dyn Storage>,
        generators: DerivativeGenerators,
    ) -> Self {
        let signer = SignedUrlIssuer::new(storage.clone(), config.storage.presign_duration);
        Self {
            config,
            storage,
            signer,
            generators,
        }
    }

    pub fn signer(&self) -> &SignedUrlIssuer {
        &self.signer
    }

    /// Check every caller input without any I/O.
    pub fn validate(&self, request: &UploadRequest) -> Result<ValidatedUpload, AppError> {
        let category = MediaCategory::parse(request.upload_type.as_deref())?;

        let max_bytes = self.config.server.max_upload_size_bytes as u64;
        if let Some(length) = request.byte_length {
            if length > max_bytes {
                return Err(AppError::PayloadTooLarge(format!(
                    "declared size {} exceeds the limit of {} bytes",
                    length, max_bytes
                )));
            }
        }

        let thumbnail = ThumbnailSpec::with_override(
            self.config.derivative.thumbnail,
            request.thumbnail_width.as_deref(),
            request.thumbnail_height.as_deref(),
        )?;

        let prefix = upload_prefix(&self.config.paths, category, request.folder.as_deref())
            .map_err(|e| match e {
                StorageError::InvalidKey(msg) => AppError::InvalidRequest(msg),
                other => AppError::Internal(other.to_string()),
            })?;

        let declared_format = request
            .declared_format
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string);
        let extension = file_extension(declared_format.as_deref(), &request.file_name);

        Ok(ValidatedUpload {
            descriptor: MediaDescriptor {
                file_name: request.file_name.clone(),
                declared_format,
                byte_length: request.byte_length,
                category,
            },
            prefix,
            extension,
            access_policy: AccessPolicy::from_optional(request.access_policy.as_deref()),
            thumbnail,
        })
    }

    /// Run one upload.
    ///
    /// `Err` means nothing was stored. `Ok(PartialSuccess)` means the primary object was
    /// stored but its derivative was not.
    #[tracing::instrument(skip_all, fields(
        upload_type = ?request.upload_type,
        file_name = %request.file_name
    ))]
    pub async fn upload(
        &self,
        request: UploadRequest,
        body: ByteStream<'_>,
    ) -> Result<UploadOutcome, AppError> {
        tracing::debug!(stage = %UploadStage::Validating, "Upload stage");
        let upload = self.validate(&request)?;
        let timestamp = UploadTimestamp::now();

        tracing::debug!(stage = %UploadStage::Uploading, "Upload stage");
        let primary = self.store_primary(&upload, &timestamp, body).await?;

        let Some(kind) = DerivativeKind::for_category(upload.descriptor.category) else {
            tracing::info!(key = %primary, "Upload completed without derivative");
            return Ok(UploadOutcome::Completed {
                primary_key: primary,
                derivative_key: None,
            });
        };

        match self.derive(&upload, &timestamp, &primary, kind).await {
            Ok(derivative) => {
                tracing::info!(
                    key = %primary,
                    derivative_key = %derivative,
                    "Upload completed"
                );
                Ok(UploadOutcome::Completed {
                    primary_key: primary,
                    derivative_key: Some(derivative),
                })
            }
            Err(failure) => {
                tracing::warn!(
                    key = %primary,
                    stage = %failure.stage,
                    error = %failure.error,
                    "Derivative failed, primary object kept"
                );
                Ok(UploadOutcome::PartialSuccess {
                    primary_key: primary,
                    failed_stage: failure.stage,
                    reason: failure.error.to_string(),
                })
            }
        }
    }

    async fn store_primary(
        &self,
        upload: &ValidatedUpload,
        timestamp: &UploadTimestamp,
        body: ByteStream<'_>,
    ) -> Result<ObjectKey, AppError> {
        let key = primary_key(&upload.prefix, timestamp, &upload.extension);
        let metadata = UploadMetadata::new(
            upload.descriptor.content_type(),
            upload.access_policy.clone(),
        )
        .with_content_length(upload.descriptor.byte_length);

        self.storage
            .put_stream(key.as_str(), body, &metadata)
            .await
            .map_err(|e| AppError::UploadFailed(e.to_string()))?;

        Ok(key)
    }

    async fn derive(
        &self,
        upload: &ValidatedUpload,
        timestamp: &UploadTimestamp,
        primary: &ObjectKey,
        kind: DerivativeKind,
    ) -> Result<ObjectKey, StageFailure> {
        tracing::debug!(stage = %UploadStage::PresigningSource, "Upload stage");
        let source_url = self.signer.presign(primary.as_str()).await.map_err(|e| {
            StageFailure::new(
                UploadStage::PresigningSource,
                AppError::PresignError(e.to_string()),
            )
        })?;

        tracing::debug!(stage = %UploadStage::GeneratingDerivative, ?kind, "Upload stage");
        let request = DerivativeRequest {
            bound: upload.thumbnail.bound(),
            declared_format: upload.descriptor.declared_format.clone(),
        };
        let derivative = self
            .generators
            .for_kind(kind)
            .generate(&source_url, &request)
            .await
            .map_err(|e| StageFailure::new(UploadStage::GeneratingDerivative, e))?;

        tracing::debug!(stage = %UploadStage::UploadingDerivative, "Upload stage");
        let key = derivative_key(&upload.prefix, timestamp, &derivative.extension);
        let metadata = UploadMetadata::new(derivative.content_type, upload.access_policy.clone())
            .with_content_length(Some(derivative.bytes.len() as u64));

        self.storage
            .put_bytes(key.as_str(), derivative.bytes, &metadata)
            .await
            .map_err(|e| {
                StageFailure::new(
                    UploadStage::UploadingDerivative,
                    AppError::UploadFailed(e.to_string()),
                )
            })?;

        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessingError;
    use crate::traits::Derivative;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::StreamExt;
    use lumen_storage::{bytes_stream, PutReceipt, StorageBackend, StorageResult};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct MockStorage {
        objects: Mutex<HashMap<String, (Bytes, UploadMetadata)>>,
        calls: AtomicUsize,
        fail_puts_under: Option<String>,
        fail_presign: bool,
    }

    impl MockStorage {
        fn keys(&self) -> Vec<String> {
            let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
            keys.sort();
            keys
        }

        fn metadata(&self, key: &str) -> UploadMetadata {
            self.objects.lock().unwrap()[key].1.clone()
        }
    }

    #[async_trait]
    impl Storage for MockStorage {
        async fn put_stream(
            &self,
            key: &str,
            mut body: ByteStream<'_>,
            metadata: &UploadMetadata,
        ) -> StorageResult<PutReceipt> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(prefix) = &self.fail_puts_under {
                if key.starts_with(prefix.as_str()) {
                    return Err(StorageError::UploadFailed("injected".to_string()));
                }
            }
            let mut data = Vec::new();
            while let Some(chunk) = body.next().await {
                data.extend_from_slice(&chunk?);
            }
            let size = data.len() as u64;
            self.objects
                .lock()
                .unwrap()
                .insert(key.to_string(), (Bytes::from(data), metadata.clone()));
            Ok(PutReceipt {
                key: key.to_string(),
                size_bytes: size,
                e_tag: None,
            })
        }

        async fn presign_get(&self, key: &str, _expires_in: Duration) -> StorageResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_presign {
                return Err(StorageError::PresignFailed("injected".to_string()));
            }
            Ok(format!("https://store.test/{}?sig=1", key))
        }

        async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
            Ok(self
                .keys()
                .into_iter()
                .filter(|k| k.starts_with(prefix))
                .collect())
        }

        async fn delete(&self, key: &str) -> StorageResult<()> {
            self.objects.lock().unwrap().remove(key);
            Ok(())
        }

        async fn exists(&self, key: &str) -> StorageResult<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.objects.lock().unwrap().contains_key(key))
        }

        fn backend_type(&self) -> StorageBackend {
            StorageBackend::Local
        }
    }

    struct MockGenerator {
        extension: &'static str,
        content_type: &'static str,
        fail: bool,
        requests: Mutex<Vec<(String, DerivativeRequest)>>,
    }

    impl MockGenerator {
        fn ok(extension: &'static str, content_type: &'static str) -> Arc<Self> {
            Arc::new(Self {
                extension,
                content_type,
                fail: false,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                extension: "gif",
                content_type: "image/gif",
                fail: true,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl DerivativeGenerator for MockGenerator {
        async fn generate(
            &self,
            source_url: &str,
            request: &DerivativeRequest,
        ) -> Result<Derivative, ProcessingError> {
            self.requests
                .lock()
                .unwrap()
                .push((source_url.to_string(), request.clone()));
            if self.fail {
                return Err(ProcessingError::Decode("no frames".to_string()));
            }
            Ok(Derivative {
                bytes: Bytes::from_static(b"derived"),
                extension: self.extension.to_string(),
                content_type: self.content_type.to_string(),
            })
        }
    }

    struct Harness {
        storage: Arc<MockStorage>,
        thumbnail: Arc<MockGenerator>,
        animation: Arc<MockGenerator>,
        orchestrator: UploadOrchestrator,
    }

    fn harness_with(
        storage: MockStorage,
        thumbnail: Arc<MockGenerator>,
        animation: Arc<MockGenerator>,
    ) -> Harness {
        let storage = Arc::new(storage);
        let orchestrator = UploadOrchestrator::new(
            Arc::new(Config::default()),
            storage.clone(),
            DerivativeGenerators::new(thumbnail.clone(), animation.clone()),
        );
        Harness {
            storage,
            thumbnail,
            animation,
            orchestrator,
        }
    }

    fn harness() -> Harness {
        harness_with(
            MockStorage::default(),
            MockGenerator::ok("png", "image/png"),
            MockGenerator::ok("gif", "image/gif"),
        )
    }

    fn photo_request() -> UploadRequest {
        UploadRequest {
            upload_type: Some("photo".to_string()),
            file_name: "beach.png".to_string(),
            declared_format: Some("image/png".to_string()),
            byte_length: Some(4),
            folder: Some("trips".to_string()),
            access_policy: Some("public-read".to_string()),
            ..Default::default()
        }
    }

    fn video_request() -> UploadRequest {
        UploadRequest {
            upload_type: Some("video".to_string()),
            file_name: "clip.mp4".to_string(),
            declared_format: Some("video/mp4".to_string()),
            ..Default::default()
        }
    }

    fn body() -> ByteStream<'static> {
        bytes_stream(b"data".to_vec())
    }

    #[tokio::test]
    async fn test_generic_file_skips_derivative() {
        let h = harness();
        let request = UploadRequest {
            upload_type: Some("file".to_string()),
            file_name: "report.pdf".to_string(),
            declared_format: Some("application/pdf".to_string()),
            folder: Some("ignored".to_string()),
            ..Default::default()
        };

        let outcome = h.orchestrator.upload(request, body()).await.unwrap();

        match outcome {
            UploadOutcome::Completed {
                primary_key,
                derivative_key,
            } => {
                assert!(primary_key.as_str().starts_with("files/"));
                assert!(primary_key.as_str().ends_with(".pdf"));
                assert!(derivative_key.is_none());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(h.storage.keys().len(), 1);
        assert_eq!(h.thumbnail.call_count() + h.animation.call_count(), 0);
    }

    #[tokio::test]
    async fn test_photo_keys_share_prefix_and_timestamp() {
        let h = harness();

        let outcome = h.orchestrator.upload(photo_request(), body()).await.unwrap();
        let (primary, derivative) = outcome.into_result().unwrap();
        let derivative = derivative.unwrap();

        let primary_stem = primary
            .as_str()
            .strip_prefix("photos/trips/")
            .unwrap()
            .strip_suffix(".png")
            .unwrap();
        let derivative_stem = derivative
            .as_str()
            .strip_prefix("photos/trips/thumbnail/")
            .unwrap()
            .strip_suffix(".png")
            .unwrap();
        assert_eq!(primary_stem, derivative_stem);

        assert_eq!(
            h.storage.keys(),
            vec![primary.as_str().to_string(), derivative.as_str().to_string()]
        );
        let stored = h.storage.metadata(derivative.as_str());
        assert_eq!(stored.content_type, "image/png");
        assert_eq!(stored.access_policy.as_str(), "public-read");
        assert_eq!(h.storage.metadata(primary.as_str()).content_length, Some(4));
    }

    #[tokio::test]
    async fn test_generator_receives_signed_url_and_bound() {
        let h = harness();
        let mut request = photo_request();
        request.thumbnail_width = Some("64".to_string());
        request.thumbnail_height = Some("48".to_string());

        let outcome = h.orchestrator.upload(request, body()).await.unwrap();

        let requests = h.thumbnail.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let (url, derivative_request) = &requests[0];
        assert_eq!(
            url,
            &format!("https://store.test/{}?sig=1", outcome.primary_key())
        );
        assert_eq!(derivative_request.bound, lumen_core::Dimension::new(64, 48));
        assert_eq!(
            derivative_request.declared_format.as_deref(),
            Some("image/png")
        );
    }

    #[tokio::test]
    async fn test_video_uses_animation_generator() {
        let h = harness();

        let outcome = h.orchestrator.upload(video_request(), body()).await.unwrap();
        let (primary, derivative) = outcome.into_result().unwrap();

        assert!(primary.as_str().starts_with("videos/"));
        assert!(primary.as_str().ends_with(".mp4"));
        let derivative = derivative.unwrap();
        assert!(derivative.as_str().starts_with("videos/thumbnail/"));
        assert!(derivative.as_str().ends_with(".gif"));
        assert_eq!(h.animation.call_count(), 1);
        assert_eq!(h.thumbnail.call_count(), 0);
    }

    #[tokio::test]
    async fn test_generation_failure_is_partial_success() {
        let h = harness_with(
            MockStorage::default(),
            MockGenerator::ok("png", "image/png"),
            MockGenerator::failing(),
        );

        let outcome = h.orchestrator.upload(video_request(), body()).await.unwrap();

        match &outcome {
            UploadOutcome::PartialSuccess {
                primary_key,
                failed_stage,
                reason,
            } => {
                assert_eq!(*failed_stage, UploadStage::GeneratingDerivative);
                assert!(reason.contains("no frames"));
                assert_eq!(h.storage.keys(), vec![primary_key.as_str().to_string()]);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(matches!(
            outcome.into_result(),
            Err(AppError::PartialSuccess { .. })
        ));
    }

    #[tokio::test]
    async fn test_presign_failure_is_partial_success() {
        let h = harness_with(
            MockStorage {
                fail_presign: true,
                ..Default::default()
            },
            MockGenerator::ok("png", "image/png"),
            MockGenerator::ok("gif", "image/gif"),
        );

        let outcome = h.orchestrator.upload(photo_request(), body()).await.unwrap();

        assert!(matches!(
            outcome,
            UploadOutcome::PartialSuccess {
                failed_stage: UploadStage::PresigningSource,
                ..
            }
        ));
        assert_eq!(h.thumbnail.call_count(), 0);
        assert_eq!(h.storage.keys().len(), 1);
    }

    #[tokio::test]
    async fn test_derivative_store_failure_is_partial_success() {
        let h = harness_with(
            MockStorage {
                fail_puts_under: Some("photos/trips/thumbnail/".to_string()),
                ..Default::default()
            },
            MockGenerator::ok("png", "image/png"),
            MockGenerator::ok("gif", "image/gif"),
        );

        let outcome = h.orchestrator.upload(photo_request(), body()).await.unwrap();

        assert!(matches!(
            outcome,
            UploadOutcome::PartialSuccess {
                failed_stage: UploadStage::UploadingDerivative,
                ..
            }
        ));
        assert_eq!(h.storage.keys().len(), 1);
    }

    #[tokio::test]
    async fn test_primary_store_failure_is_upload_failed() {
        let h = harness_with(
            MockStorage {
                fail_puts_under: Some("photos/".to_string()),
                ..Default::default()
            },
            MockGenerator::ok("png", "image/png"),
            MockGenerator::ok("gif", "image/gif"),
        );

        let result = h.orchestrator.upload(photo_request(), body()).await;

        assert!(matches!(result, Err(AppError::UploadFailed(_))));
        assert_eq!(h.thumbnail.call_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_classification_does_no_io() {
        let h = harness();

        for upload_type in [None, Some("audio".to_string()), Some("  ".to_string())] {
            let request = UploadRequest {
                upload_type,
                ..photo_request()
            };
            let result = h.orchestrator.upload(request, body()).await;
            assert!(matches!(result, Err(AppError::InvalidRequest(_))));
        }
        assert_eq!(h.storage.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_thumbnail_override_does_no_io() {
        let h = harness();
        let mut request = photo_request();
        request.thumbnail_width = Some("wide".to_string());
        request.thumbnail_height = Some("100".to_string());

        let result = h.orchestrator.upload(request, body()).await;

        assert!(matches!(result, Err(AppError::InvalidRequest(_))));
        assert_eq!(h.storage.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_folder_traversal_is_invalid_request() {
        let h = harness();
        let mut request = photo_request();
        request.folder = Some("../secrets".to_string());

        let result = h.orchestrator.upload(request, body()).await;

        assert!(matches!(result, Err(AppError::InvalidRequest(_))));
        assert_eq!(h.storage.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_declared_size_over_limit_is_rejected() {
        let h = harness();
        let mut request = photo_request();
        request.byte_length = Some(u64::MAX);

        let result = h.orchestrator.upload(request, body()).await;

        assert!(matches!(result, Err(AppError::PayloadTooLarge(_))));
    }

    #[test]
    fn test_validate_defaults_access_policy_and_content_type() {
        let h = harness();
        let validated = h
            .orchestrator
            .validate(&UploadRequest {
                upload_type: Some("video".to_string()),
                file_name: "clip.mov".to_string(),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(validated.access_policy.as_str(), "private");
        assert_eq!(validated.descriptor.content_type(), "application/octet-stream");
        assert_eq!(validated.extension, "mov");
        assert_eq!(validated.prefix, "videos/");
    }

    #[cfg(feature = "image")]
    #[tokio::test]
    async fn test_photo_round_trip_through_local_store() {
        use crate::image::PhotoDerivativeGenerator;
        use crate::source::{SourceFetcher, SOURCE_FETCH_TIMEOUT};
        use image::{GenericImageView, ImageFormat, Rgba, RgbaImage};
        use lumen_storage::LocalStorage;

        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(dir.path()).await.unwrap());
        let thumbnail = Arc::new(PhotoDerivativeGenerator::new(
            SourceFetcher::new(SOURCE_FETCH_TIMEOUT).unwrap(),
        ));
        let orchestrator = UploadOrchestrator::new(
            Arc::new(Config::default()),
            storage,
            DerivativeGenerators::new(thumbnail, MockGenerator::failing()),
        );

        let mut png = Vec::new();
        RgbaImage::from_pixel(1920, 1080, Rgba([10, 20, 30, 255]))
            .write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();

        let request = UploadRequest {
            byte_length: Some(png.len() as u64),
            ..photo_request()
        };
        let outcome = orchestrator.upload(request, bytes_stream(png)).await.unwrap();
        let (_, derivative) = outcome.into_result().unwrap();

        let stored = std::fs::read(dir.path().join(derivative.unwrap().as_str())).unwrap();
        let thumb = image::load_from_memory(&stored).unwrap();
        assert_eq!(thumb.dimensions(), (200, 112));
    }
}
