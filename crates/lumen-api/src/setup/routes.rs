//! Route configuration and setup

use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let server = &state.config.server;
    if server.max_upload_size_bytes == 0 {
        anyhow::bail!("MAX_UPLOAD_SIZE_MB must be greater than zero");
    }

    // Uploads stream far past axum's default body limit.
    let upload_routes = Router::new()
        .route("/upload", post(handlers::upload::upload))
        .route_layer(ConcurrencyLimitLayer::new(server.max_concurrent_uploads))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(server.max_upload_size_bytes));

    let router = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/presignurl", post(handlers::presign::presign_url))
        .route("/object", delete(handlers::delete::delete_object))
        .route("/folder", delete(handlers::delete::delete_folder))
        .merge(upload_routes)
        .layer(TraceLayer::new_for_http())
        .layer(setup_cors())
        .with_state(state);

    Ok(router)
}

fn setup_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any)
}
