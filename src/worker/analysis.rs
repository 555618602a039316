//! Analysis backends invoked by the worker.

use std::future::Future;

use serde_json::json;

use crate::error::AnalysisError;

/// Evidence type recorded for analysis output.
pub const GENERATED_EVIDENCE: &str = "generated";

/// Produces evidence for a run.
pub trait Analyzer: Send + Sync + 'static {
    /// Analyse `run_id` for `tenant_id` and return the evidence content.
    fn analyze(
        &self,
        tenant_id: &str,
        run_id: &str,
    ) -> impl Future<Output = Result<serde_json::Value, AnalysisError>> + Send;

    /// Prefix for evidence ids minted from this analyzer's output.
    fn evidence_prefix(&self) -> &'static str {
        "evi"
    }
}

/// Fixed demo output standing in for the climate data service.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoAnalyzer;

impl DemoAnalyzer {
    /// The demo evidence body.
    pub fn content() -> serde_json::Value {
        json!({
            "dataset_version": "demo_v1",
            "scenario": ["ssp245", "ssp585"],
            "time_slices": ["baseline", "2030s", "2050s"],
            "percentile": 50,
            "note": "Demo evidence produced by worker. Replace with ClimSystems API results.",
        })
    }
}

impl Analyzer for DemoAnalyzer {
    async fn analyze(
        &self,
        _tenant_id: &str,
        _run_id: &str,
    ) -> Result<serde_json::Value, AnalysisError> {
        Ok(Self::content())
    }

    fn evidence_prefix(&self) -> &'static str {
        "evi_demo"
    }
}
