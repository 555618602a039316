//! Unified error types for the agent API and worker.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Unified error type for the agent.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration loaded but failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Analysis error.
    #[error("analysis error: {0}")]
    Analysis(#[from] AnalysisError),
}

/// Errors raised by the in-memory store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No run with this id exists for the tenant.
    #[error("run {run_id} not found")]
    RunNotFound {
        /// The missing run id.
        run_id: String,
    },

    /// No job with this id exists.
    #[error("job {job_id} not found")]
    JobNotFound {
        /// The missing job id.
        job_id: String,
    },

    /// An evidence item with this id already exists.
    #[error("evidence {evidence_id} already exists")]
    EvidenceConflict {
        /// The duplicated evidence id.
        evidence_id: String,
    },
}

/// Errors raised while analysing a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// The job has no run attached.
    #[error("job {job_id} has no run")]
    MissingRun {
        /// The job id.
        job_id: String,
    },

    /// The analysis backend failed.
    #[error("analysis failed: {0}")]
    Failed(String),
}

/// Error returned from HTTP handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Requested run does not exist.
    #[error("run not found")]
    RunNotFound,

    /// Anything the caller cannot act on.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RunNotFound { .. } => ApiError::RunNotFound,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            ApiError::RunNotFound => (StatusCode::NOT_FOUND, "run not found"),
            ApiError::Internal(cause) => {
                error!("Internal API error: {}", cause);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, AppError>;
