//! In-process job queue with claim/lock semantics.
//!
//! Jobs live in a table keyed by id. Queued jobs are also indexed by
//! `(created_at, job_id)`, so a claim walks only the queued set and finished
//! jobs never slow it down.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StoreError;
use crate::model::{Job, JobStatus};

/// Job table plus the ordered index of queued jobs.
#[derive(Debug, Default)]
pub(super) struct JobTable {
    jobs: HashMap<String, Job>,
    queued: BTreeSet<(DateTime<Utc>, String)>,
}

impl JobTable {
    fn insert(&mut self, job: Job) {
        let job_id = job.job_id.clone();
        self.jobs.insert(job_id.clone(), job);
        self.reindex(&job_id);
    }

    /// Keep the queued index in step with the job's status.
    fn reindex(&mut self, job_id: &str) {
        let Some(job) = self.jobs.get(job_id) else {
            return;
        };
        let key = (job.created_at, job.job_id.clone());
        if job.status == JobStatus::Queued {
            self.queued.insert(key);
        } else {
            self.queued.remove(&key);
        }
    }
}

/// Job table guarded by a single lock so a claim is one critical section.
#[derive(Debug, Default)]
pub struct JobQueue {
    pub(super) table: Mutex<JobTable>,
}

impl JobQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job.
    pub async fn push(&self, job: Job) {
        self.push_with(job, || {}).await;
    }

    /// Add a job, running `commit` under the queue lock just before it.
    ///
    /// The only await is the lock itself, so a cancelled caller has written
    /// nothing, and a caller past the lock writes both or neither.
    pub async fn push_with(&self, job: Job, commit: impl FnOnce()) {
        let mut table = self.table.lock().await;
        commit();
        debug!(job_id = %job.job_id, job_type = %job.job_type, "Job enqueued");
        table.insert(job);
    }

    /// Claim the oldest due job for `worker_id`.
    pub async fn claim(&self, worker_id: &str, now: DateTime<Utc>) -> Option<Job> {
        let mut table = self.table.lock().await;
        let key = table
            .queued
            .iter()
            .find(|(_, job_id)| table.jobs.get(job_id).is_some_and(|job| job.is_due(now)))
            .cloned()?;
        table.queued.remove(&key);

        let job = table.jobs.get_mut(&key.1)?;
        job.claim(worker_id, now);
        Some(job.clone())
    }

    /// Mark a job done.
    pub async fn complete(&self, job_id: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.with_job(job_id, |job| job.complete(now)).await
    }

    /// Record a failed attempt; see [`Job::fail`].
    pub async fn fail(
        &self,
        job_id: &str,
        attempts: u32,
        max_attempts: u32,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<JobStatus, StoreError> {
        self.with_job(job_id, |job| {
            job.fail(attempts, max_attempts, error, now);
            job.status
        })
        .await
    }

    /// Snapshot of a job.
    pub async fn get(&self, job_id: &str) -> Option<Job> {
        self.table.lock().await.jobs.get(job_id).cloned()
    }

    /// Jobs attached to a run, oldest first.
    pub async fn for_run(&self, run_id: &str) -> Vec<Job> {
        let table = self.table.lock().await;
        let mut jobs: Vec<Job> = table
            .jobs
            .values()
            .filter(|job| job.run_id.as_deref() == Some(run_id))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        jobs
    }

    /// Number of jobs waiting to be claimed, due or delayed.
    pub async fn queued_len(&self) -> usize {
        self.table.lock().await.queued.len()
    }

    async fn with_job<T>(
        &self,
        job_id: &str,
        f: impl FnOnce(&mut Job) -> T,
    ) -> Result<T, StoreError> {
        let mut table = self.table.lock().await;
        let job = table
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::JobNotFound {
                job_id: job_id.to_string(),
            })?;
        let out = f(job);
        table.reindex(job_id);
        Ok(out)
    }
}
