//! Background worker that drains the job queue.
//!
//! Each pass claims the oldest due job, moves its run to `running`, runs the
//! analysis, records evidence and marks run and job `done`. A failed pass
//! marks the run `failed` with the error and hands the job back to the queue
//! with the retry backoff.

pub mod analysis;

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{AnalysisError, AppError, StoreError};
use crate::metrics;
use crate::model::{Evidence, IdGenerator, Job, JobStatus, JobType, RunStatus};
use crate::store::Store;

pub use analysis::{Analyzer, DemoAnalyzer, GENERATED_EVIDENCE};

/// Outcome of one worker pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pass {
    /// No job was due.
    Idle,
    /// The job finished.
    Completed {
        /// The processed job.
        job_id: String,
    },
    /// The job failed and was re-queued or marked failed.
    Failed {
        /// The processed job.
        job_id: String,
        /// Job status after the failure was recorded.
        status: JobStatus,
        /// Error text recorded on the run and job.
        error: String,
    },
}

/// How a spawned worker task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// The loop saw shutdown and returned.
    Stopped,
    /// The task panicked; carries the panic message.
    Panicked(String),
    /// The task was aborted.
    Cancelled,
}

/// Worker loop settings.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Lock owner recorded on claimed jobs.
    pub worker_id: String,
    /// Sleep when no job is due.
    pub poll_interval: Duration,
    /// Sleep after a store error.
    pub error_backoff: Duration,
}

impl WorkerConfig {
    /// Derive worker settings from application config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            worker_id: config.worker_identity(),
            poll_interval: config.poll_interval(),
            error_backoff: config.error_backoff(),
        }
    }
}

/// Job queue consumer.
pub struct Worker<A: Analyzer = DemoAnalyzer> {
    store: Arc<Store>,
    analyzer: A,
    config: WorkerConfig,
    evidence_ids: IdGenerator,
}

impl<A: Analyzer> Worker<A> {
    /// Create a worker over `store` using `analyzer`.
    pub fn new(store: Arc<Store>, analyzer: A, config: WorkerConfig) -> Self {
        let evidence_ids = IdGenerator::new(analyzer.evidence_prefix());
        Self {
            store,
            analyzer,
            config,
            evidence_ids,
        }
    }

    /// Worker identity.
    pub fn id(&self) -> &str {
        &self.config.worker_id
    }

    /// Run until `shutdown` flips to true or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Worker starting: {}", self.id());

        while !*shutdown.borrow() {
            let delay = match self.run_once(Utc::now()).await {
                Ok(Pass::Idle) => Some(self.config.poll_interval),
                Ok(_) => None,
                Err(e) => {
                    error!("Worker pass failed: {}", e);
                    Some(self.config.error_backoff)
                }
            };

            if let Some(delay) = delay {
                tokio::select! {
                    _ = sleep(delay) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        info!("Worker stopped: {}", self.id());
    }

    /// Claim and process at most one job.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<Pass, StoreError> {
        let Some(job) = self.store.claim_job(self.id(), now).await else {
            return Ok(Pass::Idle);
        };

        metrics::inc_jobs_claimed();
        let _timer = metrics::timer_job();
        info!(
            "Claimed job {} type={} run_id={}",
            job.job_id,
            job.job_type,
            job.run_id.as_deref().unwrap_or("-")
        );

        match self.process(&job, now).await {
            Ok(()) => {
                self.store.complete_job(&job.job_id, now).await?;
                metrics::inc_jobs_completed();
                debug!(job_id = %job.job_id, "Job done");
                Ok(Pass::Completed { job_id: job.job_id })
            }
            Err(err) => {
                let message = err.to_string();
                warn!("Job error: {} ({})", message, job.job_id);

                if let Some(run_id) = &job.run_id {
                    if let Err(e) = self.store.set_run_status(
                        &job.tenant_id,
                        run_id,
                        RunStatus::Failed,
                        Some(message.clone()),
                        now,
                    ) {
                        warn!("Could not mark run {} failed: {}", run_id, e);
                    }
                }

                let status = self
                    .store
                    .fail_job(&job.job_id, job.attempts, job.max_attempts, &message, now)
                    .await?;
                match status {
                    JobStatus::Failed => metrics::inc_jobs_failed(),
                    _ => metrics::inc_jobs_retried(),
                }

                Ok(Pass::Failed {
                    job_id: job.job_id,
                    status,
                    error: message,
                })
            }
        }
    }

    async fn process(&self, job: &Job, now: DateTime<Utc>) -> Result<(), AppError> {
        if let Some(run_id) = &job.run_id {
            self.store
                .set_run_status(&job.tenant_id, run_id, RunStatus::Running, None, now)?;
        }

        match job.job_type {
            JobType::RunAnalysis => {
                let run_id = job.run_id.as_deref().ok_or_else(|| AnalysisError::MissingRun {
                    job_id: job.job_id.clone(),
                })?;
                self.run_analysis(&job.tenant_id, run_id, now).await?;
            }
        }

        if let Some(run_id) = &job.run_id {
            self.store
                .set_run_status(&job.tenant_id, run_id, RunStatus::Done, None, now)?;
        }

        Ok(())
    }

    async fn run_analysis(
        &self,
        tenant_id: &str,
        run_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let content = self.analyzer.analyze(tenant_id, run_id).await?;
        self.store.add_evidence(Evidence {
            evidence_id: self.evidence_ids.next_id(),
            tenant_id: tenant_id.to_string(),
            run_id: Some(run_id.to_string()),
            evidence_type: GENERATED_EVIDENCE.to_string(),
            created_at: now,
            content,
        })?;
        Ok(())
    }
}

/// Spawn `worker` on the runtime and watch it.
///
/// The returned handle resolves as soon as the worker task ends, and a panic
/// is logged at that moment rather than when someone gets around to joining.
pub fn spawn_supervised<A: Analyzer>(
    worker: Worker<A>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<WorkerExit> {
    let worker_id = worker.id().to_string();
    let task = tokio::spawn(async move { worker.run(shutdown).await });

    tokio::spawn(async move {
        match task.await {
            Ok(()) => WorkerExit::Stopped,
            Err(e) if e.is_panic() => {
                let message = panic_message(e.into_panic());
                error!("Worker {} panicked: {}", worker_id, message);
                WorkerExit::Panicked(message)
            }
            Err(e) => {
                error!("Worker {} cancelled: {}", worker_id, e);
                WorkerExit::Cancelled
            }
        }
    })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::JsonMap;
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls, then succeeds.
    struct FlakyAnalyzer {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyAnalyzer {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }
    }

    impl Analyzer for FlakyAnalyzer {
        async fn analyze(
            &self,
            _tenant_id: &str,
            _run_id: &str,
        ) -> Result<serde_json::Value, AnalysisError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(AnalysisError::Failed(format!("upstream unavailable #{}", call)))
            } else {
                Ok(serde_json::json!({"ok": true}))
            }
        }
    }

    struct PanickingAnalyzer;

    impl Analyzer for PanickingAnalyzer {
        async fn analyze(
            &self,
            _tenant_id: &str,
            _run_id: &str,
        ) -> Result<serde_json::Value, AnalysisError> {
            panic!("analyzer exploded")
        }
    }

    fn config() -> WorkerConfig {
        WorkerConfig {
            worker_id: "test-worker".to_string(),
            poll_interval: Duration::from_millis(10),
            error_backoff: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn idle_when_queue_is_empty() {
        let worker = Worker::new(Arc::new(Store::new()), DemoAnalyzer, config());
        assert_eq!(worker.run_once(Utc::now()).await.unwrap(), Pass::Idle);
    }

    #[tokio::test]
    async fn pass_completes_run_with_evidence() {
        let store = Arc::new(Store::new());
        let now = Utc::now();
        let run = store.create_run("default", None, JsonMap::new(), 3, now).await;
        let worker = Worker::new(store.clone(), DemoAnalyzer, config());

        let pass = worker.run_once(now).await.unwrap();
        assert!(matches!(pass, Pass::Completed { .. }));

        let run = store.get_run("default", &run.run_id).unwrap();
        assert_eq!(run.status, RunStatus::Done);
        assert!(run.error.is_none());

        let evidence = store.list_evidence("default", Some(&run.run_id));
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].evidence_type, GENERATED_EVIDENCE);
        assert!(evidence[0].evidence_id.starts_with("evi_demo_"));
        assert_eq!(evidence[0].content, DemoAnalyzer::content());

        let jobs = store.jobs_for_run(&run.run_id).await;
        assert_eq!(jobs[0].status, JobStatus::Done);
        assert_eq!(jobs[0].locked_by.as_deref(), Some("test-worker"));
    }

    #[tokio::test]
    async fn failure_marks_run_failed_and_requeues() {
        let store = Arc::new(Store::new());
        let now = Utc::now();
        let run = store.create_run("default", None, JsonMap::new(), 3, now).await;
        let worker = Worker::new(store.clone(), FlakyAnalyzer::new(1), config());

        let (status, error) = match worker.run_once(now).await.unwrap() {
            Pass::Failed { status, error, .. } => (status, error),
            other => panic!("expected failure, got {:?}", other),
        };
        assert_eq!(status, JobStatus::Queued);
        assert!(error.contains("upstream unavailable"));

        let failed = store.get_run("default", &run.run_id).unwrap();
        assert_eq!(failed.status, RunStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some(error.as_str()));

        // Not due until the first backoff step has elapsed.
        assert_eq!(worker.run_once(now).await.unwrap(), Pass::Idle);

        let retry_at = now + ChronoDuration::seconds(5);
        assert!(matches!(
            worker.run_once(retry_at).await.unwrap(),
            Pass::Completed { .. }
        ));
        let done = store.get_run("default", &run.run_id).unwrap();
        assert_eq!(done.status, RunStatus::Done);
        assert!(done.error.is_none());
    }

    #[tokio::test]
    async fn job_fails_after_max_attempts() {
        let store = Arc::new(Store::new());
        let now = Utc::now();
        let run = store.create_run("default", None, JsonMap::new(), 2, now).await;
        let worker = Worker::new(store.clone(), FlakyAnalyzer::new(u32::MAX), config());

        let first = worker.run_once(now).await.unwrap();
        assert!(matches!(first, Pass::Failed { status: JobStatus::Queued, .. }));

        let second = worker
            .run_once(now + ChronoDuration::seconds(5))
            .await
            .unwrap();
        assert!(matches!(second, Pass::Failed { status: JobStatus::Failed, .. }));

        let jobs = store.jobs_for_run(&run.run_id).await;
        assert_eq!(jobs[0].attempts, 2);
        assert_eq!(jobs[0].status, JobStatus::Failed);
        assert_eq!(
            store.get_run("default", &run.run_id).unwrap().status,
            RunStatus::Failed
        );
        assert_eq!(
            worker.run_once(now + ChronoDuration::hours(1)).await.unwrap(),
            Pass::Idle
        );
    }

    #[tokio::test]
    async fn run_loop_drains_queue_and_stops_on_shutdown() {
        let store = Arc::new(Store::new());
        let run = store
            .create_run("default", None, JsonMap::new(), 3, Utc::now())
            .await;
        let worker = Arc::new(Worker::new(store.clone(), DemoAnalyzer, config()));
        let (tx, rx) = watch::channel(false);

        let handle = {
            let worker = worker.clone();
            tokio::spawn(async move { worker.run(rx).await })
        };

        for _ in 0..100 {
            if store.get_run("default", &run.run_id).unwrap().status == RunStatus::Done {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(
            store.get_run("default", &run.run_id).unwrap().status,
            RunStatus::Done
        );

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn supervisor_reports_panic_without_shutdown() {
        let store = Arc::new(Store::new());
        store
            .create_run("default", None, JsonMap::new(), 3, Utc::now())
            .await;
        let worker = Worker::new(store, PanickingAnalyzer, config());
        let (_tx, rx) = watch::channel(false);

        let exit = tokio::time::timeout(Duration::from_secs(2), spawn_supervised(worker, rx))
            .await
            .expect("panic was not reported")
            .unwrap();
        assert_eq!(exit, WorkerExit::Panicked("analyzer exploded".to_string()));
    }

    #[tokio::test]
    async fn supervisor_reports_clean_stop() {
        let worker = Worker::new(Arc::new(Store::new()), DemoAnalyzer, config());
        let (tx, rx) = watch::channel(false);
        let handle = spawn_supervised(worker, rx);

        tx.send(true).unwrap();
        let exit = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
        assert_eq!(exit, WorkerExit::Stopped);
    }
}
