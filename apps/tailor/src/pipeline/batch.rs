//! BatchOrchestrator: runs many job pipelines under a concurrency limit.
//!
//! At most `max_concurrent` pipelines hold a permit at once. Each job runs in
//! its own task, so a failure (or a panic) in one job is recorded and never
//! reaches its siblings. The orchestrator waits for every job before
//! returning.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::JobError;
use crate::models::job::{InputValidationError, Job, PendingJob};
use crate::pipeline::events::PipelineObserver;
use crate::pipeline::job::{JobOutcome, JobPipeline};
use crate::pipeline::output::{job_dir_name, job_id_component};
use crate::store::JobQueue;

#[derive(Debug, Clone, Serialize)]
pub struct JobFailure {
    pub job_id: String,
    pub code: &'static str,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobSuccess {
    pub job_id: String,
    pub output_dir: PathBuf,
}

/// Summary of one batch. Result order need not match submission order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub run_id: Uuid,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub successes: Vec<JobSuccess>,
    pub failures: Vec<JobFailure>,
}

impl BatchResult {
    fn new(attempted: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            attempted,
            succeeded: 0,
            failed: 0,
            successes: Vec::new(),
            failures: Vec::new(),
        }
    }

    fn record_success(&mut self, outcome: JobOutcome) {
        self.succeeded += 1;
        self.successes.push(JobSuccess {
            job_id: outcome.job_id,
            output_dir: outcome.output_dir,
        });
    }

    fn record_failure(&mut self, job_id: String, error: &JobError) {
        self.failed += 1;
        self.failures.push(JobFailure {
            job_id,
            code: error.code(),
            reason: error.to_string(),
        });
    }
}

/// Output locations already taken in this batch. Ids are compared as they
/// appear in file names, so `a/b` and `a_b` collide.
#[derive(Default)]
struct OutputClaims {
    ids: HashSet<String>,
    dirs: HashSet<String>,
}

impl OutputClaims {
    /// Records the job's output location, or rejects it if an earlier job
    /// already holds it. Records that fail input validation claim nothing;
    /// the pipeline rejects them on its own.
    fn claim(&mut self, pending: &PendingJob) -> Result<(), InputValidationError> {
        let Ok(job) = Job::from_pending(pending) else {
            return Ok(());
        };
        let id = job_id_component(job.job_id());
        let dir = job_dir_name(&job);
        if self.ids.contains(&id) {
            return Err(InputValidationError::DuplicateJobId(job.job_id().to_string()));
        }
        if self.dirs.contains(&dir) {
            return Err(InputValidationError::OutputDirectoryTaken(dir));
        }
        self.ids.insert(id);
        self.dirs.insert(dir);
        Ok(())
    }
}

pub struct BatchOrchestrator {
    pipeline: Arc<JobPipeline>,
    observer: Arc<dyn PipelineObserver>,
    max_concurrent: usize,
    job_timeout: Option<Duration>,
    queue: Option<Arc<dyn JobQueue>>,
}

impl BatchOrchestrator {
    pub fn new(
        pipeline: Arc<JobPipeline>,
        observer: Arc<dyn PipelineObserver>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            pipeline,
            observer,
            max_concurrent: max_concurrent.max(1),
            job_timeout: None,
            queue: None,
        }
    }

    /// Caps each job's total run time. Unset means only per-call timeouts apply.
    pub fn with_job_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.job_timeout = timeout;
        self
    }

    /// Successful jobs are marked processed in `queue`.
    pub fn with_queue(mut self, queue: Arc<dyn JobQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub async fn run(&self, jobs: Vec<PendingJob>) -> BatchResult {
        let mut result = BatchResult::new(jobs.len());
        info!(
            run_id = %result.run_id,
            "Processing {} job(s), at most {} at a time",
            jobs.len(),
            self.max_concurrent
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut claims = OutputClaims::default();
        let mut handles = Vec::with_capacity(jobs.len());

        for pending in jobs {
            let job_id = pending.display_id();
            if let Err(rejection) = claims.claim(&pending) {
                let error = JobError::from(rejection);
                self.observer.on_job_failed(&job_id, &error);
                result.record_failure(job_id, &error);
                continue;
            }

            let semaphore = semaphore.clone();
            let pipeline = self.pipeline.clone();
            let timeout = self.job_timeout;
            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| JobError::Internal(format!("scheduler closed: {e}")))?;
                match timeout {
                    Some(limit) => tokio::time::timeout(limit, pipeline.run(&pending))
                        .await
                        .unwrap_or(Err(JobError::DeadlineExceeded(limit))),
                    None => pipeline.run(&pending).await,
                }
            });
            handles.push((job_id, handle));
        }

        for (job_id, handle) in handles {
            match handle.await {
                Ok(Ok(outcome)) => {
                    info!(
                        job_id = %outcome.job_id,
                        "{} document(s) in {}",
                        outcome.artifacts.len(),
                        outcome.output_dir.display()
                    );
                    if let Some(queue) = &self.queue {
                        if let Err(e) = queue.mark_processed(&outcome.job_id).await {
                            warn!(job_id = %outcome.job_id, "Could not mark job processed: {:#}", e);
                        }
                    }
                    result.record_success(outcome);
                }
                Ok(Err(error)) => {
                    if matches!(error, JobError::DeadlineExceeded(_)) {
                        self.observer.on_job_failed(&job_id, &error);
                    }
                    result.record_failure(job_id, &error);
                }
                Err(join_error) => {
                    let error = JobError::Internal(format!("job task aborted: {join_error}"));
                    self.observer.on_job_failed(&job_id, &error);
                    result.record_failure(job_id, &error);
                }
            }
        }

        info!(
            run_id = %result.run_id,
            "Batch finished: {} attempted, {} succeeded, {} failed",
            result.attempted,
            result.succeeded,
            result.failed
        );
        result
    }
}
