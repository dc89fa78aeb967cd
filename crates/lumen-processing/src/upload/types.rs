//! Types for the upload pipeline.

use lumen_core::{AccessPolicy, MediaDescriptor, ThumbnailSpec};

/// Raw caller input for one upload, as received from the transport.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    /// `video`, `photo`, or `file`.
    pub upload_type: Option<String>,
    pub file_name: String,
    /// MIME-like token, e.g. `image/png`.
    pub declared_format: Option<String>,
    pub byte_length: Option<u64>,
    /// Optional sub-folder under the classification path.
    pub folder: Option<String>,
    pub access_policy: Option<String>,
    pub thumbnail_width: Option<String>,
    pub thumbnail_height: Option<String>,
}

/// An upload that passed validation. Built without touching the store.
#[derive(Debug, Clone)]
pub struct ValidatedUpload {
    pub descriptor: MediaDescriptor,
    /// Key prefix ending in `/`, e.g. `photos/trips/`.
    pub prefix: String,
    /// Extension of the primary object.
    pub extension: String,
    pub access_policy: AccessPolicy,
    pub thumbnail: ThumbnailSpec,
}
