use crate::traits::{ByteStream, PutReceipt, Storage, StorageError, StorageResult, UploadMetadata};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use http::{HeaderMap, HeaderValue, Method};
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, Attributes, ClientOptions, ObjectStore, ObjectStoreExt, PutOptions, PutPayload,
    Result as ObjectResult, WriteMultipart,
};
use std::collections::HashMap;
use std::time::Duration;

/// Canned ACLs S3 understands; a client is prepared for each at construction.
const CANNED_ACLS: &[&str] = &[
    "private",
    "public-read",
    "public-read-write",
    "authenticated-read",
    "aws-exec-read",
    "bucket-owner-read",
    "bucket-owner-full-control",
];

/// Parts uploaded concurrently by one streamed write.
const MAX_PARTS_IN_FLIGHT: usize = 4;

/// S3 storage implementation
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    /// One client per canned ACL; each sends `x-amz-acl` on every request.
    acl_stores: HashMap<&'static str, AmazonS3>,
    bucket: String,
    region: String,
    endpoint_url: Option<String>, // Custom endpoint for S3-compatible providers
    part_size: usize,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO, "https://nyc3.digitaloceanspaces.com" for DigitalOcean Spaces)
    /// * `part_size` - Buffer size of each multipart part; S3 requires at least 5 MiB
    pub fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        part_size: usize,
    ) -> StorageResult<Self> {
        let store = build_store(&bucket, &region, endpoint_url.as_deref(), None)?;

        let mut acl_stores = HashMap::with_capacity(CANNED_ACLS.len());
        for acl in CANNED_ACLS {
            acl_stores.insert(
                *acl,
                build_store(&bucket, &region, endpoint_url.as_deref(), Some(acl))?,
            );
        }

        Ok(S3Storage {
            store,
            acl_stores,
            bucket,
            region,
            endpoint_url,
            part_size,
        })
    }

    /// Client that applies `acl` to writes. Tokens outside the canned set get a
    /// one-off client so they still reach S3 unchanged.
    fn store_for_acl(&self, acl: &str) -> StorageResult<AmazonS3> {
        match self.acl_stores.get(acl) {
            Some(store) => Ok(store.clone()),
            None => build_store(
                &self.bucket,
                &self.region,
                self.endpoint_url.as_deref(),
                Some(acl),
            ),
        }
    }

    async fn write_parts(
        &self,
        store: &AmazonS3,
        location: &Path,
        mut body: ByteStream<'_>,
        attributes: Attributes,
    ) -> ObjectResult<(u64, Option<String>)> {
        let upload = store.put_multipart_opts(location, attributes.into()).await?;
        let mut writer = WriteMultipart::new_with_chunk_size(upload, self.part_size);
        let mut written: u64 = 0;

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    // Caller's stream broke; the partial upload is abandoned.
                    writer.abort().await?;
                    return Err(ObjectStoreError::Generic {
                        store: "S3",
                        source: Box::new(e),
                    });
                }
            };
            writer.wait_for_capacity(MAX_PARTS_IN_FLIGHT).await?;
            written += chunk.len() as u64;
            writer.write(&chunk);
        }

        let result = writer.finish().await?;
        Ok((written, result.e_tag))
    }
}

fn build_store(
    bucket: &str,
    region: &str,
    endpoint_url: Option<&str>,
    acl: Option<&str>,
) -> StorageResult<AmazonS3> {
    let mut builder = AmazonS3Builder::from_env()
        .with_region(region)
        .with_bucket_name(bucket);

    if let Some(endpoint) = endpoint_url {
        let allow_http = endpoint.starts_with("http://");
        builder = builder.with_endpoint(endpoint).with_allow_http(allow_http);
    }

    if let Some(acl) = acl {
        let value = HeaderValue::from_str(acl).map_err(|_| {
            StorageError::ConfigError(format!("access policy '{}' is not a valid header", acl))
        })?;
        let mut headers = HeaderMap::new();
        headers.insert("x-amz-acl", value);
        builder = builder.with_client_options(ClientOptions::new().with_default_headers(headers));
    }

    builder
        .build()
        .map_err(|e| StorageError::ConfigError(e.to_string()))
}

/// Object path for a storage key, kept verbatim.
///
/// `Path::from` percent-encodes characters such as `~` and `%`, so the stored name would
/// no longer match the key returned to the caller.
fn object_path(key: &str) -> StorageResult<Path> {
    Path::parse(key).map_err(|e| StorageError::InvalidKey(format!("{}: {}", key, e)))
}

/// Directory that contains every key starting with `prefix`: everything before its last `/`.
fn list_root(prefix: &str) -> &str {
    prefix.rfind('/').map(|i| &prefix[..i]).unwrap_or("")
}

/// Keys starting with `prefix` as a plain string, the way S3 ListObjects matches.
///
/// object_store lists whole path segments, so the enclosing directory is listed and
/// filtered here.
async fn list_by_prefix(store: &dyn ObjectStore, prefix: &str) -> StorageResult<Vec<String>> {
    let root = list_root(prefix);
    let location = if root.is_empty() {
        None
    } else {
        Some(object_path(root)?)
    };

    let mut keys: Vec<String> = store
        .list(location.as_ref())
        .map_ok(|meta| meta.location.to_string())
        .try_filter(|key| futures::future::ready(key.starts_with(prefix)))
        .try_collect()
        .await
        .map_err(|e| StorageError::ListFailed(e.to_string()))?;

    keys.sort();
    Ok(keys)
}

/// Content type and user metadata. S3 derives the object's length from the body itself.
fn put_attributes(metadata: &UploadMetadata) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert(Attribute::ContentType, metadata.content_type.clone().into());
    for (name, value) in &metadata.user_metadata {
        attributes.insert(Attribute::Metadata(name.clone().into()), value.clone().into());
    }
    attributes
}

#[async_trait]
impl Storage for S3Storage {
    async fn put_stream(
        &self,
        key: &str,
        body: ByteStream<'_>,
        metadata: &UploadMetadata,
    ) -> StorageResult<PutReceipt> {
        let location = object_path(key)?;
        let store = self.store_for_acl(metadata.access_policy.as_str())?;
        let start = std::time::Instant::now();

        let (size, e_tag) = self
            .write_parts(&store, &location, body, put_attributes(metadata))
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    acl = %metadata.access_policy,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 stream upload failed"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        if let Some(expected) = metadata.content_length {
            if expected != size {
                tracing::warn!(
                    key = %key,
                    declared_bytes = expected,
                    size_bytes = size,
                    "Declared content length differs from bytes written"
                );
            }
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            content_type = %metadata.content_type,
            acl = %metadata.access_policy,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 stream upload successful"
        );

        Ok(PutReceipt {
            key: key.to_string(),
            size_bytes: size,
            e_tag,
        })
    }

    /// Single PUT; derivatives are small enough that a multipart upload is pure overhead.
    async fn put_bytes(
        &self,
        key: &str,
        data: Bytes,
        metadata: &UploadMetadata,
    ) -> StorageResult<PutReceipt> {
        let location = object_path(key)?;
        let store = self.store_for_acl(metadata.access_policy.as_str())?;
        let start = std::time::Instant::now();
        let size = data.len() as u64;

        let result = store
            .put_opts(
                &location,
                PutPayload::from(data),
                PutOptions::from(put_attributes(metadata)),
            )
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    acl = %metadata.access_policy,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            content_type = %metadata.content_type,
            acl = %metadata.access_policy,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(PutReceipt {
            key: key.to_string(),
            size_bytes: size,
            e_tag: result.e_tag,
        })
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let location = object_path(key)?;
        let url_result: ObjectResult<_> = self
            .store
            .signed_url(Method::GET, &location, expires_in)
            .await;

        let url = url_result
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?
            .to_string();

        Ok(url)
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let start = std::time::Instant::now();

        let keys = list_by_prefix(&self.store, prefix).await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                prefix = %prefix,
                "S3 list failed"
            );
            e
        })?;

        tracing::info!(
            bucket = %self.bucket,
            prefix = %prefix,
            count = keys.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 list successful"
        );

        Ok(keys)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let location = object_path(key)?;

        let result: ObjectResult<_> = self.store.delete(&location).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 delete failed"
            );
            StorageError::DeleteFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let location = object_path(key)?;
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
