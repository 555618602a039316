//! Background jobs and their retry policy.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Delays before re-running a failed job, indexed by attempts so far.
pub const RETRY_BACKOFF_SECS: [i64; 3] = [5, 20, 60];

/// Longest error text kept on a job.
pub const MAX_ERROR_LEN: usize = 2000;

/// Kind of work a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    /// Analyse a run and attach evidence.
    RunAnalysis,
}

/// Job queue state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Failed,
}

/// A queued unit of background work.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub job_id: String,
    pub tenant_id: String,
    pub run_id: Option<String>,
    pub job_type: JobType,
    pub status: JobStatus,
    pub payload: serde_json::Value,
    pub attempts: u32,
    pub max_attempts: u32,
    pub run_after: DateTime<Utc>,
    pub locked_by: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a job that is due immediately.
    pub fn queued(
        job_id: String,
        tenant_id: &str,
        run_id: Option<String>,
        job_type: JobType,
        payload: serde_json::Value,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id,
            tenant_id: tenant_id.to_string(),
            run_id,
            job_type,
            status: JobStatus::Queued,
            payload,
            attempts: 0,
            max_attempts,
            run_after: now,
            locked_by: None,
            locked_at: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a worker may claim this job at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Queued && self.run_after <= now
    }

    /// Lock the job for `worker_id`.
    pub fn claim(&mut self, worker_id: &str, now: DateTime<Utc>) {
        self.status = JobStatus::Running;
        self.locked_by = Some(worker_id.to_string());
        self.locked_at = Some(now);
        self.updated_at = now;
    }

    /// Mark the job finished.
    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Done;
        self.updated_at = now;
    }

    /// Record a failed attempt.
    ///
    /// `attempts` is the count observed when the job was claimed. The job is
    /// re-queued after the backoff delay while attempts remain, otherwise it
    /// is marked failed.
    pub fn fail(&mut self, attempts: u32, max_attempts: u32, error: &str, now: DateTime<Utc>) {
        let next_attempts = attempts + 1;
        if next_attempts < max_attempts {
            self.status = JobStatus::Queued;
            self.run_after = now + retry_delay(attempts);
        } else {
            self.status = JobStatus::Failed;
            self.run_after = now;
        }
        self.attempts = next_attempts;
        self.last_error = Some(truncate_error(error));
        self.locked_by = None;
        self.locked_at = None;
        self.updated_at = now;
    }
}

/// Delay before retrying after `attempts` previous attempts.
pub fn retry_delay(attempts: u32) -> Duration {
    let idx = (attempts as usize).min(RETRY_BACKOFF_SECS.len() - 1);
    Duration::seconds(RETRY_BACKOFF_SECS[idx])
}

fn truncate_error(error: &str) -> String {
    error.chars().take(MAX_ERROR_LEN).collect()
}
