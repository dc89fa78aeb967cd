use lumen_core::Config;
use lumen_processing::UploadOrchestrator;
use lumen_storage::{SignedUrlIssuer, Storage};
use std::sync::Arc;

/// Shared handler state. Built once at startup; nothing in it changes per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: Arc<dyn Storage>,
    pub signer: SignedUrlIssuer,
    pub uploads: UploadOrchestrator,
}

impl AppState {
    pub fn new(config: Arc<Config>, storage: Arc<dyn Storage>, uploads: UploadOrchestrator) -> Self {
        Self {
            signer: uploads.signer().clone(),
            config,
            storage,
            uploads,
        }
    }
}
