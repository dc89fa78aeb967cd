use std::sync::Arc;

use axum::extract::{Query, State};
use lumen_core::AppError;
use serde::Deserialize;

use crate::error::HttpAppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DeleteObjectQuery {
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteFolderQuery {
    prefix: Option<String>,
}

fn required(value: Option<String>, name: &str) -> Result<String, HttpAppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::InvalidRequest(format!("query parameter '{}' is required", name)).into())
}

/// Delete a single object and echo its key.
#[tracing::instrument(skip(state), fields(operation = "delete_object"))]
pub async fn delete_object(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeleteObjectQuery>,
) -> Result<String, HttpAppError> {
    let key = required(query.key, "key")?;
    state.storage.delete(&key).await?;
    Ok(key)
}

/// Delete every object under a prefix.
///
/// Deletions run one after another; the first failure stops the sweep and is returned.
#[tracing::instrument(skip(state), fields(operation = "delete_folder"))]
pub async fn delete_folder(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeleteFolderQuery>,
) -> Result<String, HttpAppError> {
    let prefix = required(query.prefix, "prefix")?;
    // An empty-looking prefix would match the whole bucket.
    if prefix.trim_matches('/').is_empty() {
        return Err(AppError::InvalidRequest("prefix must name a folder".to_string()).into());
    }

    let keys = state.storage.list(&prefix).await?;
    for key in &keys {
        state.storage.delete(key).await?;
    }

    tracing::info!(prefix = %prefix, count = keys.len(), "Deleted folder");
    Ok(format!("deleted {} objects", keys.len()))
}
