//! Analysis runs and their lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

use super::JsonMap;

/// Run lifecycle state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RunStatus {
    /// Created, waiting for a worker.
    Queued,
    /// A worker is analysing the run.
    Running,
    /// Analysis finished and evidence was recorded.
    Done,
    /// The last attempt failed; `error` holds the reason.
    Failed,
}

/// An analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Run {
    pub run_id: String,
    #[serde(skip)]
    pub tenant_id: String,
    pub status: RunStatus,
    #[schema(value_type = Object)]
    pub parameters: JsonMap,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl Run {
    /// Create a queued run. `name` is stored under the `name` parameter key
    /// unless the caller's parameters already carry one.
    pub fn queued(
        run_id: String,
        tenant_id: &str,
        name: Option<String>,
        parameters: JsonMap,
        now: DateTime<Utc>,
    ) -> Self {
        let mut merged = JsonMap::new();
        merged.insert(
            "name".to_string(),
            name.map(serde_json::Value::String)
                .unwrap_or(serde_json::Value::Null),
        );
        merged.extend(parameters);

        Self {
            run_id,
            tenant_id: tenant_id.to_string(),
            status: RunStatus::Queued,
            parameters: merged,
            created_at: now,
            updated_at: now,
            error: None,
        }
    }
}
