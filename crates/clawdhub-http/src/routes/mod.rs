//! API route definitions.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};
use clawdhub_registry::MAX_BUNDLE_BYTES;
use std::sync::Arc;

use crate::handlers;
use crate::openapi::ApiDoc;
use crate::ratelimit;
use crate::server::AppState;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create the versioned API router
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        // Search
        .route("/search", get(handlers::search))
        // Skills
        .route("/skills", get(handlers::list_skills))
        .route("/skills", post(handlers::publish_skill))
        .route("/skills/:slug", get(handlers::get_skill))
        .route("/skills/:slug", delete(handlers::soft_delete_skill))
        .route("/skills/:slug/undelete", post(handlers::undelete_skill))
        .route("/skills/:slug/versions", get(handlers::list_versions))
        .route("/skills/:slug/versions/:version", get(handlers::get_version))
        .route("/skills/:slug/file", get(handlers::get_file))
        // Resolution & downloads
        .route("/skill/resolve", get(handlers::resolve))
        .route("/download", get(handlers::download))
        // Stars
        .route("/stars/:slug", post(handlers::star_skill))
        .route("/stars/:slug", delete(handlers::unstar_skill))
        // Identity & health
        .route("/whoami", get(handlers::whoami))
        .route("/health", get(handlers::health_check))
        // Budget enforcement wraps every endpoint above
        .layer(middleware::from_fn_with_state(state.clone(), ratelimit::enforce))
        // Bundles may approach the 50 MB cap; leave headroom for
        // multipart framing
        .layer(DefaultBodyLimit::max(MAX_BUNDLE_BYTES as usize + 1024 * 1024))
        .with_state(state)
}

/// Create the full application router
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/docs/api").url("/api/openapi.json", ApiDoc::openapi()))
        .nest("/api/v1", api_routes(state))
        .fallback(handlers::not_found)
}
