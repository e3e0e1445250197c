use super::handlers;
use super::state::AppState;
use crate::Config;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn media_routes(config: &Config) -> Router<Arc<AppState>> {
    let upload_limit = upload_body_limit(config);

    Router::new()
        .route(
            "/media",
            get(handlers::media::list_media)
                .post(handlers::media::create_media)
                .fallback(handlers::method_not_allowed),
        )
        .route(
            "/media/:id",
            get(handlers::media::get_media)
                .put(handlers::media::update_media)
                .delete(handlers::media::delete_media)
                .fallback(handlers::method_not_allowed),
        )
        .route(
            "/media/:id/attachment",
            post(handlers::media::upload_attachment)
                .fallback(handlers::method_not_allowed)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
}

/// Body cap for the upload route. The global request-body cap still applies,
/// and the file limit (plus framing) can only tighten it.
fn upload_body_limit(config: &Config) -> usize {
    config
        .limits
        .max_request_body
        .min(config.attachments.max_file_size + MULTIPART_OVERHEAD)
}

pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/health",
        get(handlers::health::health).fallback(handlers::method_not_allowed),
    )
}
