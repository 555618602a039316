//! OpenAPI document for the API routes.

use utoipa::OpenApi;

use super::handlers::{
    BulkUpsertRequest, BulkUpsertResponse, CreateRunRequest, CreateRunResponse, HealthResponse,
};
use crate::model::{AssetIn, Evidence, Run, RunStatus};

/// OpenAPI description served at `/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(title = "ClimSystems AI Agent API", version = "0.1.0"),
    paths(
        super::handlers::health,
        super::handlers::bulk_upsert,
        super::handlers::create_run,
        super::handlers::get_run,
        super::handlers::list_evidence,
    ),
    components(schemas(
        HealthResponse,
        AssetIn,
        BulkUpsertRequest,
        BulkUpsertResponse,
        CreateRunRequest,
        CreateRunResponse,
        Run,
        RunStatus,
        Evidence,
    ))
)]
pub struct ApiDoc;
