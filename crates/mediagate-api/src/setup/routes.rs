//! Route table and HTTP middleware stack

use crate::constants::{API_PREFIX, MAX_BODY_BYTES, REQUEST_TIMEOUT_SECONDS};
use crate::handlers::{files, health, tags, uploads};
use crate::state::AppState;
use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use mediagate_db::UnitOfWork;
use mediagate_infra::request_id_middleware;
use std::sync::Arc;
use std::time::Duration;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

const HTTP_CONCURRENCY_LIMIT: usize = 10_000;

fn api_routes<U: UnitOfWork>() -> Router<Arc<AppState<U>>> {
    Router::new()
        .route("/files", post(files::request_upload_file::<U>))
        .route(
            "/files/multipart",
            post(files::request_upload_multipart_file::<U>),
        )
        .route("/files/{file_id}", get(files::get_file::<U>))
        .route(
            "/uploads/{session_id}/parts",
            post(uploads::presign_parts::<U>).get(uploads::list_parts::<U>),
        )
        .route(
            "/uploads/{session_id}/complete",
            post(uploads::complete_multipart_upload::<U>),
        )
        .route(
            "/tags",
            post(tags::create_tags::<U>).get(tags::list_tags::<U>),
        )
        .route("/tags/{name}", get(tags::get_tag::<U>))
}

/// Full application router with its middleware stack.
pub fn build_router<U: UnitOfWork>(state: Arc<AppState<U>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .nest(API_PREFIX, api_routes::<U>())
        .route("/health", get(health::health))
        .layer(ConcurrencyLimitLayer::new(HTTP_CONCURRENCY_LIMIT))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECONDS)))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state)
}
