//! HTTP API handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;
use crate::model::{default_tenant, AssetIn, Evidence, JsonMap, Run, RunStatus};
use crate::store::Store;

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Shared store.
    pub store: Arc<Store>,
    /// Attempts granted to jobs enqueued by this API.
    pub max_attempts: u32,
    /// Prometheus render handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new app state over `store`.
    pub fn new(store: Arc<Store>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts,
            metrics: None,
        }
    }

    /// Attach a Prometheus handle for the metrics route.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Always true when the service can answer.
    pub ok: bool,
}

/// Bulk upsert request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkUpsertRequest {
    /// Tenant owning the assets.
    #[serde(default = "default_tenant")]
    pub tenant_id: String,
    /// Assets to insert or update.
    pub assets: Vec<AssetIn>,
}

/// Bulk upsert response.
#[derive(Debug, Serialize, ToSchema)]
pub struct BulkUpsertResponse {
    /// Number of assets written.
    pub upserted: usize,
}

/// Run creation request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRunRequest {
    /// Tenant owning the run.
    #[serde(default = "default_tenant")]
    pub tenant_id: String,
    /// Optional display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Free-form run parameters.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub parameters: JsonMap,
}

/// Run creation response.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateRunResponse {
    /// New run id.
    pub run_id: String,
    /// Initial status, always `queued`.
    pub status: RunStatus,
}

/// Tenant selector for lookups.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TenantQuery {
    /// Tenant id, `default` when omitted.
    #[serde(default = "default_tenant")]
    pub tenant_id: String,
}

/// Evidence listing filters.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EvidenceQuery {
    /// Restrict to one run.
    #[serde(default)]
    pub run_id: Option<String>,
    /// Tenant id, `default` when omitted.
    #[serde(default = "default_tenant")]
    pub tenant_id: String,
}

/// Health check handler.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
        (status = 500, description = "Store unavailable"),
    )
)]
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    state.store.ping()?;
    Ok(Json(HealthResponse { ok: true }))
}

/// Insert or update a batch of assets.
#[utoipa::path(
    post,
    path = "/v1/assets:bulk_upsert",
    request_body = BulkUpsertRequest,
    responses((status = 200, description = "Assets written", body = BulkUpsertResponse))
)]
pub async fn bulk_upsert(
    State(state): State<AppState>,
    Json(req): Json<BulkUpsertRequest>,
) -> Json<BulkUpsertResponse> {
    let upserted = state
        .store
        .upsert_assets(&req.tenant_id, req.assets, Utc::now());
    Json(BulkUpsertResponse { upserted })
}

/// Create a run and enqueue its analysis job.
#[utoipa::path(
    post,
    path = "/v1/runs",
    request_body = CreateRunRequest,
    responses((status = 200, description = "Run queued", body = CreateRunResponse))
)]
pub async fn create_run(
    State(state): State<AppState>,
    Json(req): Json<CreateRunRequest>,
) -> Json<CreateRunResponse> {
    let run = state
        .store
        .create_run(
            &req.tenant_id,
            req.name,
            req.parameters,
            state.max_attempts,
            Utc::now(),
        )
        .await;

    Json(CreateRunResponse {
        run_id: run.run_id,
        status: run.status,
    })
}

/// Fetch a run and its status.
#[utoipa::path(
    get,
    path = "/v1/runs/{run_id}",
    params(("run_id" = String, Path, description = "Run id"), TenantQuery),
    responses(
        (status = 200, description = "Run found", body = Run),
        (status = 404, description = "run not found"),
    )
)]
pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<Run>, ApiError> {
    let run = state.store.get_run(&query.tenant_id, &run_id)?;
    Ok(Json(run))
}

/// List evidence, newest first.
#[utoipa::path(
    get,
    path = "/v1/evidence",
    params(EvidenceQuery),
    responses((status = 200, description = "Evidence items", body = [Evidence]))
)]
pub async fn list_evidence(
    State(state): State<AppState>,
    Query(query): Query<EvidenceQuery>,
) -> Json<Vec<Evidence>> {
    Json(
        state
            .store
            .list_evidence(&query.tenant_id, query.run_id.as_deref()),
    )
}

/// Prometheus exposition.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
