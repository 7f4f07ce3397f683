//! Pipeline progress events.
//!
//! The pipeline never prints. It reports through `PipelineObserver`, and the
//! default `TracingObserver` turns events into log records.

use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::errors::JobError;
use crate::generation::runner::StageId;
use crate::pipeline::job::JobState;

/// Subscriber for pipeline progress. Every method defaults to a no-op.
pub trait PipelineObserver: Send + Sync {
    fn on_job_start(&self, _job_id: &str) {}
    fn on_job_state(&self, _job_id: &str, _state: JobState) {}
    fn on_stage_start(&self, _job_id: &str, _stage: StageId) {}
    fn on_stage_retry(&self, _job_id: &str, _stage: StageId, _attempt: u32, _reason: &str) {}
    fn on_stage_success(&self, _job_id: &str, _stage: StageId, _attempt: u32) {}
    fn on_job_complete(&self, _job_id: &str, _output_dir: &Path) {}
    fn on_job_failed(&self, _job_id: &str, _error: &JobError) {}
}

pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_job_start(&self, job_id: &str) {
        info!(job_id, "Job started");
    }

    fn on_job_state(&self, job_id: &str, state: JobState) {
        debug!(job_id, ?state, "Job state changed");
    }

    fn on_stage_start(&self, job_id: &str, stage: StageId) {
        info!(job_id, "{} started", stage);
    }

    fn on_stage_retry(&self, job_id: &str, stage: StageId, attempt: u32, reason: &str) {
        warn!(job_id, attempt, "{} attempt failed, retrying: {}", stage, reason);
    }

    fn on_stage_success(&self, job_id: &str, stage: StageId, attempt: u32) {
        info!(job_id, attempt, "{} complete", stage);
    }

    fn on_job_complete(&self, job_id: &str, output_dir: &Path) {
        info!(job_id, output_dir = %output_dir.display(), "Job complete");
    }

    fn on_job_failed(&self, job_id: &str, error: &JobError) {
        error!(job_id, code = error.code(), "Job failed: {}", error);
    }
}
