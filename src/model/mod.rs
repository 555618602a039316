//! Domain types: assets, runs, jobs and evidence.

pub mod asset;
pub mod evidence;
pub mod ids;
pub mod job;
pub mod run;

pub use asset::{Asset, AssetIn};
pub use evidence::Evidence;
pub use ids::IdGenerator;
pub use job::{Job, JobStatus, JobType};
pub use run::{Run, RunStatus};

/// Tenant used when a request does not name one.
pub const DEFAULT_TENANT: &str = "default";

/// Serde default for `tenant_id` fields.
pub fn default_tenant() -> String {
    DEFAULT_TENANT.to_string()
}

/// Free-form JSON object attached to assets and runs.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;
