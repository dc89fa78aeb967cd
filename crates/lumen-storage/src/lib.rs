//! Lumen Storage Library
//!
//! Object Store Gateway for the upload pipeline: the `Storage` trait, an S3 backend
//! built on `object_store`, a local filesystem backend, and the signed URL issuer.
//!
//! # Key layout
//!
//! - Primary objects: `{category path}{folder}/{timestamp}.{extension}`
//! - Derivatives: `{category path}{folder}/thumbnail/{same timestamp}.{derivative extension}`
//!
//! Key composition lives in the `keys` module so every caller agrees on the layout.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod presign;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::{derivative_key, primary_key, thumbnail_prefix, upload_prefix, THUMBNAIL_SEGMENT};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use lumen_core::StorageBackend;
pub use presign::SignedUrlIssuer;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{
    bytes_stream, ByteStream, PutReceipt, Storage, StorageError, StorageResult, UploadMetadata,
};
