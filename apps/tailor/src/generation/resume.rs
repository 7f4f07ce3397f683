use std::sync::Arc;

use serde_json::Value;

use crate::errors::JobError;
use crate::generation::prompts::{PromptLibrary, ResumePrompt};
use crate::generation::runner::{RetryingStageRunner, Stage, StageId, StageScope};
use crate::models::intelligence::ResonanceAnalysis;
use crate::models::job::Job;
use crate::models::profile::MasterProfile;
use crate::models::resume::TailoredResume;
use crate::schema::resume::{check_resume_quality, validate_tailored_resume};
use crate::schema::SchemaResult;

pub struct ResumeStage;

impl Stage for ResumeStage {
    type Output = TailoredResume;

    fn id(&self) -> StageId {
        StageId::Resume
    }

    fn validate(&self, payload: Value) -> SchemaResult<TailoredResume> {
        validate_tailored_resume(payload)
    }

    fn check_quality(&self, output: &TailoredResume) -> Result<(), String> {
        check_resume_quality(output)
    }
}

/// Produces the tailored resume. There is no fallback: an exhausted stage
/// fails the job rather than accepting a partial resume.
pub struct ResumeGenerator {
    runner: Arc<RetryingStageRunner>,
    prompts: Arc<PromptLibrary>,
}

impl ResumeGenerator {
    pub fn new(runner: Arc<RetryingStageRunner>, prompts: Arc<PromptLibrary>) -> Self {
        Self { runner, prompts }
    }

    pub async fn generate(
        &self,
        job: &Job,
        profile: &MasterProfile,
        resonance: &ResonanceAnalysis,
        scope: StageScope<'_>,
    ) -> Result<TailoredResume, JobError> {
        let prompt = self.prompts.render(&ResumePrompt {
            job,
            profile,
            resonance,
        })?;
        self.runner.run(&ResumeStage, &prompt, scope).await
    }
}
