use std::sync::Arc;

use serde_json::Value;

use crate::errors::JobError;
use crate::generation::prompts::{CoverLetterPrompt, PromptLibrary};
use crate::generation::runner::{RetryingStageRunner, Stage, StageId, StageScope};
use crate::models::intelligence::{CompanyResearch, ResonanceAnalysis, StorytellingArc};
use crate::models::job::Job;
use crate::models::resume::TailoredResume;
use crate::schema::{SchemaResult, Violation, ViolationKind};

/// Free-text stage. The only gate is a minimum length.
pub struct CoverLetterStage {
    pub min_chars: usize,
}

impl Stage for CoverLetterStage {
    type Output = String;

    fn id(&self) -> StageId {
        StageId::CoverLetter
    }

    fn extract(&self, response: &str) -> Result<Value, String> {
        Ok(Value::String(response.trim().to_string()))
    }

    fn validate(&self, payload: Value) -> SchemaResult<String> {
        match payload {
            Value::String(text) => Ok(text),
            other => Err(vec![Violation {
                field: "$".to_string(),
                message: format!("expected plain text, got {other}"),
                kind: ViolationKind::InvalidShape,
            }]),
        }
    }

    fn check_quality(&self, output: &String) -> Result<(), String> {
        let len = output.chars().count();
        if len < self.min_chars {
            return Err(format!(
                "Cover letter is too short (min {} chars, got {len}). \
                 Please generate a more detailed and complete cover letter.",
                self.min_chars
            ));
        }
        Ok(())
    }

    fn artifact(&self, output: &String) -> Result<String, serde_json::Error> {
        Ok(output.clone())
    }
}

pub struct CoverLetterGenerator {
    runner: Arc<RetryingStageRunner>,
    prompts: Arc<PromptLibrary>,
    min_chars: usize,
}

impl CoverLetterGenerator {
    pub fn new(runner: Arc<RetryingStageRunner>, prompts: Arc<PromptLibrary>, min_chars: usize) -> Self {
        Self {
            runner,
            prompts,
            min_chars,
        }
    }

    pub async fn generate(
        &self,
        job: &Job,
        research: &CompanyResearch,
        resonance: &ResonanceAnalysis,
        arc: &StorytellingArc,
        resume: &TailoredResume,
        scope: StageScope<'_>,
    ) -> Result<String, JobError> {
        let prompt = self.prompts.render(&CoverLetterPrompt {
            job,
            research,
            resonance,
            arc,
            resume,
        })?;
        let stage = CoverLetterStage {
            min_chars: self.min_chars,
        };
        self.runner.run(&stage, &prompt, scope).await
    }
}
