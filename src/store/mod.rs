//! In-memory store for assets, runs, jobs and evidence.
//!
//! State lives for the lifetime of the process. Assets, runs and evidence sit
//! in [`DashMap`]s; jobs go through [`JobQueue`] so a claim is atomic. A run
//! is inserted under the queue lock together with its job.

pub mod queue;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::json;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::metrics;
use crate::model::{
    Asset, AssetIn, Evidence, IdGenerator, Job, JobStatus, JobType, JsonMap, Run, RunStatus,
};

pub use queue::JobQueue;

/// Evidence listing limit when no run is given.
pub const EVIDENCE_PAGE_LIMIT: usize = 50;

/// Shared application store.
#[derive(Debug)]
pub struct Store {
    assets: DashMap<(String, String), Asset>,
    runs: DashMap<String, Run>,
    evidence: DashMap<String, Evidence>,
    jobs: JobQueue,
    run_ids: IdGenerator,
    job_ids: IdGenerator,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            assets: DashMap::new(),
            runs: DashMap::new(),
            evidence: DashMap::new(),
            jobs: JobQueue::new(),
            run_ids: IdGenerator::new("run"),
            job_ids: IdGenerator::new("job"),
        }
    }

    /// Liveness probe used by the health route.
    pub fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    // === Assets ===

    /// Insert or update assets for a tenant. Returns the number submitted.
    pub fn upsert_assets(&self, tenant_id: &str, assets: Vec<AssetIn>, now: DateTime<Utc>) -> usize {
        let count = assets.len();
        for input in assets {
            let key = (tenant_id.to_string(), input.external_id.clone());
            match self.assets.entry(key) {
                Entry::Occupied(mut slot) => slot.get_mut().apply(input, now),
                Entry::Vacant(slot) => {
                    slot.insert(Asset::create(tenant_id, input, now));
                }
            }
        }
        if count > 0 {
            metrics::inc_assets_upserted(count as u64);
            debug!(tenant_id, count, "Assets upserted");
        }
        count
    }

    /// Fetch one asset.
    pub fn get_asset(&self, tenant_id: &str, external_id: &str) -> Option<Asset> {
        self.assets
            .get(&(tenant_id.to_string(), external_id.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Number of assets held for a tenant.
    pub fn asset_count(&self, tenant_id: &str) -> usize {
        self.assets
            .iter()
            .filter(|entry| entry.key().0 == tenant_id)
            .count()
    }

    // === Runs ===

    /// Create a queued run and enqueue its analysis job.
    pub async fn create_run(
        &self,
        tenant_id: &str,
        name: Option<String>,
        parameters: JsonMap,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Run {
        let run = Run::queued(self.run_ids.next_id(), tenant_id, name, parameters, now);
        let job = Job::queued(
            self.job_ids.next_id(),
            tenant_id,
            Some(run.run_id.clone()),
            JobType::RunAnalysis,
            json!({ "demo": true }),
            max_attempts,
            now,
        );
        let job_id = job.job_id.clone();

        // The run becomes visible only while the queue lock is held, right
        // before its job, so there is never a run without a job.
        self.jobs
            .push_with(job, || {
                self.runs.insert(run.run_id.clone(), run.clone());
            })
            .await;
        info!(run_id = %run.run_id, %job_id, tenant_id, "Run created");
        metrics::inc_runs_created();

        run
    }

    /// Fetch a run owned by `tenant_id`.
    pub fn get_run(&self, tenant_id: &str, run_id: &str) -> Result<Run, StoreError> {
        self.runs
            .get(run_id)
            .filter(|run| run.tenant_id == tenant_id)
            .map(|run| run.value().clone())
            .ok_or_else(|| StoreError::RunNotFound {
                run_id: run_id.to_string(),
            })
    }

    /// Move a run to `status`, replacing its error.
    pub fn set_run_status(
        &self,
        tenant_id: &str,
        run_id: &str,
        status: RunStatus,
        error: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut run = self
            .runs
            .get_mut(run_id)
            .filter(|run| run.tenant_id == tenant_id)
            .ok_or_else(|| StoreError::RunNotFound {
                run_id: run_id.to_string(),
            })?;
        run.status = status;
        run.error = error;
        run.updated_at = now;
        debug!(run_id, %status, "Run status updated");
        Ok(())
    }

    // === Jobs ===

    /// Claim the oldest due job.
    pub async fn claim_job(&self, worker_id: &str, now: DateTime<Utc>) -> Option<Job> {
        self.jobs.claim(worker_id, now).await
    }

    /// Mark a job done.
    pub async fn complete_job(&self, job_id: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.jobs.complete(job_id, now).await
    }

    /// Record a failed job attempt and schedule its retry.
    pub async fn fail_job(
        &self,
        job_id: &str,
        attempts: u32,
        max_attempts: u32,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<JobStatus, StoreError> {
        self.jobs.fail(job_id, attempts, max_attempts, error, now).await
    }

    /// Snapshot of a job.
    pub async fn get_job(&self, job_id: &str) -> Option<Job> {
        self.jobs.get(job_id).await
    }

    /// Jobs attached to a run.
    pub async fn jobs_for_run(&self, run_id: &str) -> Vec<Job> {
        self.jobs.for_run(run_id).await
    }

    // === Evidence ===

    /// Attach an evidence item.
    pub fn add_evidence(&self, evidence: Evidence) -> Result<(), StoreError> {
        match self.evidence.entry(evidence.evidence_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::EvidenceConflict {
                evidence_id: evidence.evidence_id,
            }),
            Entry::Vacant(slot) => {
                slot.insert(evidence);
                Ok(())
            }
        }
    }

    /// Evidence for a tenant, newest first.
    ///
    /// With `run_id`, every item of that run; otherwise the latest
    /// [`EVIDENCE_PAGE_LIMIT`] items of the tenant.
    pub fn list_evidence(&self, tenant_id: &str, run_id: Option<&str>) -> Vec<Evidence> {
        let mut items: Vec<Evidence> = self
            .evidence
            .iter()
            .filter(|entry| entry.tenant_id == tenant_id)
            .filter(|entry| run_id.is_none() || entry.run_id.as_deref() == run_id)
            .map(|entry| entry.value().clone())
            .collect();

        items.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.evidence_id.cmp(&a.evidence_id))
        });
        if run_id.is_none() {
            items.truncate(EVIDENCE_PAGE_LIMIT);
        }
        items
    }
}
