//! HTTP API route definitions.

use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::http::Method;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use super::docs::ApiDoc;
use super::handlers::{
    bulk_upsert, create_run, get_run, health, list_evidence, metrics, AppState,
};
use crate::metrics::record_http_latency;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        // Health endpoint
        .route("/health", get(health))
        // Assets
        .route("/v1/assets:bulk_upsert", post(bulk_upsert))
        // Runs
        .route("/v1/runs", post(create_run))
        .route("/v1/runs/{run_id}", get(get_run))
        // Evidence
        .route("/v1/evidence", get(list_evidence))
        // Docs and metrics
        .route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .route("/metrics", get(metrics))
        .route_layer(middleware::from_fn(track_latency))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn track_latency(req: Request, next: Next) -> Response {
    let endpoint = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let start = Instant::now();
    let response = next.run(req).await;
    record_http_latency(start, &endpoint);
    response
}
