use std::io;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::TryStreamExt;
use lumen_core::{AppError, UploadOutcome};
use lumen_processing::UploadRequest;
use lumen_storage::ByteStream;
use serde::{Deserialize, Serialize};

use crate::error::HttpAppError;
use crate::state::AppState;

/// Request header carrying the access policy for the stored objects.
pub const ACL_HEADER: &str = "acl";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadQuery {
    upload_type: Option<String>,
    folder: Option<String>,
    thumbnail_width: Option<String>,
    thumbnail_height: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub key: String,
    pub thumbnail_key: Option<String>,
    /// Present on a 207: the stage that failed after the primary object was stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadResponse {
    /// Status and body for an orchestrator outcome.
    pub fn from_outcome(outcome: UploadOutcome) -> (StatusCode, Self) {
        match outcome {
            UploadOutcome::Completed {
                primary_key,
                derivative_key,
            } => (
                StatusCode::OK,
                UploadResponse {
                    key: primary_key.into_string(),
                    thumbnail_key: derivative_key.map(|k| k.into_string()),
                    failed_stage: None,
                    error: None,
                },
            ),
            UploadOutcome::PartialSuccess {
                primary_key,
                failed_stage,
                reason,
            } => (
                StatusCode::MULTI_STATUS,
                UploadResponse {
                    key: primary_key.into_string(),
                    thumbnail_key: None,
                    failed_stage: Some(failed_stage.to_string()),
                    error: Some(reason),
                },
            ),
        }
    }
}

/// Upload handler
///
/// Streams the first file part of the multipart body to the store, then generates and
/// stores its derivative. The part is never buffered whole in memory.
///
/// # Returns
/// - 200 with `{ key, thumbnailKey }` when every stage succeeded
/// - 207 with `{ key, thumbnailKey: null, failedStage, error }` when only the primary
///   object was stored
///
/// # Errors
/// - `AppError::InvalidRequest` - missing/unknown `uploadType`, bad thumbnail override,
///   bad folder, or no file part
/// - `AppError::UploadFailed` - the primary object could not be stored
#[tracing::instrument(
    skip(state, headers, multipart),
    fields(
        upload_type = ?query.upload_type,
        folder = ?query.folder,
        operation = "upload"
    )
)]
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, HttpAppError> {
    let access_policy = headers
        .get(ACL_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let field = loop {
        match multipart.next_field().await? {
            Some(field) if field.file_name().is_some() => break field,
            Some(_) => continue,
            None => {
                return Err(
                    AppError::InvalidRequest("request has no file part".to_string()).into(),
                )
            }
        }
    };

    let byte_length = field
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    let request = UploadRequest {
        upload_type: query.upload_type,
        file_name: field.file_name().unwrap_or_default().to_string(),
        declared_format: field.content_type().map(str::to_string),
        byte_length,
        folder: query.folder,
        access_policy,
        thumbnail_width: query.thumbnail_width,
        thumbnail_height: query.thumbnail_height,
    };

    let body: ByteStream<'_> = Box::pin(field.map_err(io::Error::other));
    let outcome = state.uploads.upload(request, body).await?;

    let (status, response) = UploadResponse::from_outcome(outcome);
    if status == StatusCode::MULTI_STATUS {
        tracing::warn!(
            key = %response.key,
            failed_stage = ?response.failed_stage,
            "Upload stored without derivative"
        );
    }

    Ok((status, Json(response)).into_response())
}
