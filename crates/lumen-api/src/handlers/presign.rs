use std::sync::Arc;

use axum::extract::State;
use lumen_core::AppError;

use crate::error::HttpAppError;
use crate::state::AppState;

/// Issue a signed GET URL for the object key sent as the raw request body.
#[tracing::instrument(skip(state, body), fields(operation = "presign"))]
pub async fn presign_url(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<String, HttpAppError> {
    let key = body.trim();
    if key.is_empty() {
        return Err(AppError::InvalidRequest("object key is required".to_string()).into());
    }

    let url = state.signer.presign(key).await?;
    Ok(url)
}
