//! Stage runner: the attempt / validate / feedback / retry loop shared by
//! every generation stage.
//!
//! Each attempt moves through three gates: extraction (text → structured
//! value), schema (structured value → typed artifact) and quality (semantic
//! minimums). A failure at any gate builds gate-specific feedback that is
//! prepended to the base prompt on the next attempt. Only the most recent
//! feedback is carried, so the prompt never grows past one correction.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::PipelineSettings;
use crate::errors::{FailureKind, JobError};
use crate::generation::prompts::{
    malformed_output_feedback, quality_feedback, violation_feedback, with_feedback,
};
use crate::llm_client::{extract_structured_payload, GenerationClient};
use crate::pipeline::events::PipelineObserver;
use crate::pipeline::incidents::{Incident, IncidentLog};
use crate::schema::{describe_violations, SchemaResult};

/// The five generation stages, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageId {
    JobResonance,
    CompanyResearch,
    Resume,
    StorytellingArc,
    CoverLetter,
}

impl StageId {
    pub const ALL: [StageId; 5] = [
        StageId::JobResonance,
        StageId::CompanyResearch,
        StageId::Resume,
        StageId::StorytellingArc,
        StageId::CoverLetter,
    ];

    /// Prefix for per-attempt debug files and the validated artifact.
    pub fn artifact_prefix(self) -> &'static str {
        match self {
            StageId::JobResonance => "Job_Resonance_Analysis",
            StageId::CompanyResearch => "Company_Research",
            StageId::Resume => "Resume",
            StageId::StorytellingArc => "Storytelling_Arc",
            StageId::CoverLetter => "CoverLetter",
        }
    }

    /// File name of the validated artifact.
    pub fn artifact_file(self) -> String {
        match self {
            StageId::CoverLetter => format!("{}.txt", self.artifact_prefix()),
            _ => format!("{}.json", self.artifact_prefix()),
        }
    }

    /// Name of the prompt override file in `prompts_dir`, without extension.
    pub fn template_name(self) -> &'static str {
        match self {
            StageId::JobResonance => "analyze_job_resonance",
            StageId::CompanyResearch => "research_company",
            StageId::Resume => "generate_resume",
            StageId::StorytellingArc => "generate_storytelling_arc",
            StageId::CoverLetter => "generate_cover_letter",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageId::JobResonance => "Job Resonance Analysis",
            StageId::CompanyResearch => "Company Research",
            StageId::Resume => "Resume Generation",
            StageId::StorytellingArc => "Storytelling Arc",
            StageId::CoverLetter => "Cover Letter Generation",
        };
        f.write_str(name)
    }
}

/// One generation stage: how to read a response and what counts as valid.
pub trait Stage: Send + Sync {
    type Output: Serialize + Send;

    fn id(&self) -> StageId;

    /// Pulls the structured payload out of raw model text.
    fn extract(&self, response: &str) -> Result<Value, String> {
        extract_structured_payload(response).map_err(|e| e.to_string())
    }

    fn validate(&self, payload: Value) -> SchemaResult<Self::Output>;

    /// Semantic minimums beyond the schema shape.
    fn check_quality(&self, _output: &Self::Output) -> Result<(), String> {
        Ok(())
    }

    /// Text persisted as the validated artifact.
    fn artifact(&self, output: &Self::Output) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(output)
    }
}

/// Where a stage writes its artifacts and which job its incidents belong to.
#[derive(Debug, Clone, Copy)]
pub struct StageScope<'a> {
    pub job_id: &'a str,
    pub company: &'a str,
    pub dir: &'a Path,
}

/// Per-stage retry state. Created at stage start, dropped at success or
/// terminal failure.
#[derive(Debug)]
pub struct RetryContext {
    attempt: u32,
    max_attempts: u32,
    feedback: Option<String>,
}

impl RetryContext {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            feedback: None,
        }
    }

    /// Advances the counter and returns the 1-based attempt number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    /// Replaces any earlier feedback; history is never accumulated.
    pub fn record_feedback(&mut self, feedback: String) {
        self.feedback = Some(feedback);
    }

    pub fn prompt(&self, base: &str) -> String {
        match &self.feedback {
            Some(feedback) => with_feedback(base, feedback),
            None => base.to_string(),
        }
    }
}

struct GateFailure {
    kind: FailureKind,
    detail: String,
    feedback: String,
}

pub struct RetryingStageRunner {
    client: Arc<dyn GenerationClient>,
    settings: Arc<PipelineSettings>,
    incidents: Arc<IncidentLog>,
    observer: Arc<dyn PipelineObserver>,
}

impl RetryingStageRunner {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        settings: Arc<PipelineSettings>,
        incidents: Arc<IncidentLog>,
        observer: Arc<dyn PipelineObserver>,
    ) -> Self {
        Self {
            client,
            settings,
            incidents,
            observer,
        }
    }

    /// Runs `stage` until its output passes every gate or attempts run out.
    ///
    /// Collaborator failures are not retried here; the client has already
    /// spent its own transport retries.
    pub async fn run<S: Stage>(
        &self,
        stage: &S,
        base_prompt: &str,
        scope: StageScope<'_>,
    ) -> Result<S::Output, JobError> {
        let id = stage.id();
        let target = self.settings.stage(id);
        let mut ctx = RetryContext::new(self.settings.max_stage_attempts);
        self.observer.on_stage_start(scope.job_id, id);

        loop {
            let attempt = ctx.begin_attempt();
            let prompt = ctx.prompt(base_prompt);
            debug!(
                "{} attempt {} for job {} ({} prompt chars)",
                id,
                attempt,
                scope.job_id,
                prompt.len()
            );

            let response = self
                .client
                .generate(&prompt, &target.model, &target.parameters)
                .await
                .map_err(|source| JobError::CollaboratorUnavailable { stage: id, source })?;

            let raw_path = scope
                .dir
                .join(format!("{}_Raw_Attempt_{}.txt", id.artifact_prefix(), attempt));
            tokio::fs::write(&raw_path, &response).await?;

            let failure = match self.check_gates(stage, &response, attempt, scope).await? {
                Ok(output) => {
                    let artifact = stage.artifact(&output)?;
                    tokio::fs::write(scope.dir.join(id.artifact_file()), artifact).await?;
                    self.observer.on_stage_success(scope.job_id, id, attempt);
                    return Ok(output);
                }
                Err(failure) => failure,
            };

            if ctx.is_exhausted() {
                return Err(JobError::StageExhausted {
                    stage: id,
                    attempts: attempt,
                    kind: failure.kind,
                    detail: failure.detail,
                });
            }
            self.observer
                .on_stage_retry(scope.job_id, id, attempt, &failure.detail);
            ctx.record_feedback(failure.feedback);
        }
    }

    /// Outer `Err` is job-fatal (I/O); inner `Err` is a retryable gate failure.
    async fn check_gates<S: Stage>(
        &self,
        stage: &S,
        response: &str,
        attempt: u32,
        scope: StageScope<'_>,
    ) -> Result<Result<S::Output, GateFailure>, JobError> {
        let id = stage.id();

        let payload = match stage.extract(response) {
            Ok(payload) => payload,
            Err(e) => {
                return Ok(Err(GateFailure {
                    kind: FailureKind::Extraction,
                    feedback: malformed_output_feedback(&e),
                    detail: format!("malformed output: {e}"),
                }));
            }
        };

        if !payload.is_string() {
            let json_path = scope
                .dir
                .join(format!("{}_JSON_Attempt_{}.json", id.artifact_prefix(), attempt));
            tokio::fs::write(&json_path, serde_json::to_string_pretty(&payload)?).await?;
        }

        let output = match stage.validate(payload) {
            Ok(output) => output,
            Err(violations) => {
                let incident = Incident::new(id, scope.job_id, scope.company, attempt, &violations);
                if let Err(e) = self.incidents.append(&incident).await {
                    warn!("Failed to append incident for job {}: {}", scope.job_id, e);
                }
                return Ok(Err(GateFailure {
                    kind: FailureKind::SchemaViolation,
                    feedback: violation_feedback(id, &violations),
                    detail: describe_violations(&violations),
                }));
            }
        };

        if let Err(reason) = stage.check_quality(&output) {
            return Ok(Err(GateFailure {
                kind: FailureKind::QualityThreshold,
                feedback: quality_feedback(&reason),
                detail: reason,
            }));
        }

        Ok(Ok(output))
    }
}
