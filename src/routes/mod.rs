//! Router assembly: HTTP endpoints, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - REST-ish API under `/api/v1/...`
/// - one resource per editing session, with nested block/item/upload/wizard routes
/// - CORS (allow any origin/method/headers) – adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
/// - a body limit large enough for a base64-encoded upload at the size cap
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.upload.max_bytes / 3 * 4 + 64 * 1024;
    let session_routes = Router::new()
        .route("/", get(http::http_get_session).delete(http::http_discard_session))
        .route("/lesson", patch(http::http_patch_lesson))
        .route("/blocks", post(http::http_add_block))
        .route(
            "/blocks/:block",
            patch(http::http_patch_block).delete(http::http_remove_block),
        )
        .route("/blocks/:block/move", post(http::http_move_block))
        .route("/blocks/:block/items", post(http::http_add_item))
        .route(
            "/blocks/:block/items/:item",
            patch(http::http_patch_item).delete(http::http_remove_item),
        )
        .route("/uploads", post(http::http_begin_upload))
        .route("/uploads/drag", post(http::http_drag_upload))
        .route("/uploads/clear", post(http::http_clear_upload))
        .route("/wizard/next", post(http::http_wizard_next))
        .route("/wizard/previous", post(http::http_wizard_previous))
        .route("/wizard/goto", post(http::http_wizard_goto))
        .route("/submit", post(http::http_submit));

    Router::new()
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/remedies", get(http::http_get_remedies))
        .route("/api/v1/sessions", post(http::http_open_session))
        .nest("/api/v1/sessions/:session", session_routes)
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_request(DefaultOnRequest::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}
