pub mod admin;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod search;

use std::sync::Arc;

use axum::http::HeaderName;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the full router: the spec's core-relevant endpoints (§6.1) plus the
/// cross-cutting request-id/CORS/timeout/tracing layers every route shares.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let request_timeout = state.config.shell.request_timeout;
    let request_max_bytes = state.config.shell.request_max_bytes;
    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/v1/messages", post(messages::create_message))
        .route("/v1/messages/{id}", get(messages::get_message))
        .route("/v1/memory/search", get(search::search))
        .route("/v1/admin/retention/run", post(admin::run_retention))
        .route("/v1/admin/health", get(admin::health))
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state),
            middleware::rate_limit,
        ))
        .layer(axum::extract::DefaultBodyLimit::max(request_max_bytes))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}
