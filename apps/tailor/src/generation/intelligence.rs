//! Intelligence gathering: resonance analysis, company research and the
//! storytelling arc. Each is one stage-runner invocation with its own schema;
//! the arc runs after resume generation because it draws on the resume.

use std::sync::Arc;

use serde_json::Value;

use crate::errors::JobError;
use crate::generation::prompts::{
    CompanyResearchPrompt, PromptLibrary, ResonancePrompt, StorytellingArcPrompt,
};
use crate::generation::runner::{RetryingStageRunner, Stage, StageId, StageScope};
use crate::models::intelligence::{CompanyResearch, ResonanceAnalysis, StorytellingArc};
use crate::models::job::Job;
use crate::models::resume::TailoredResume;
use crate::schema::intelligence::{
    check_company_research_quality, check_resonance_quality, check_storytelling_arc_quality,
    validate_company_research, validate_resonance, validate_storytelling_arc,
};
use crate::schema::SchemaResult;

pub struct ResonanceStage;

impl Stage for ResonanceStage {
    type Output = ResonanceAnalysis;

    fn id(&self) -> StageId {
        StageId::JobResonance
    }

    fn validate(&self, payload: Value) -> SchemaResult<ResonanceAnalysis> {
        validate_resonance(payload)
    }

    fn check_quality(&self, output: &ResonanceAnalysis) -> Result<(), String> {
        check_resonance_quality(output)
    }
}

pub struct CompanyResearchStage;

impl Stage for CompanyResearchStage {
    type Output = CompanyResearch;

    fn id(&self) -> StageId {
        StageId::CompanyResearch
    }

    fn validate(&self, payload: Value) -> SchemaResult<CompanyResearch> {
        validate_company_research(payload)
    }

    fn check_quality(&self, output: &CompanyResearch) -> Result<(), String> {
        check_company_research_quality(output)
    }
}

pub struct StorytellingArcStage;

impl Stage for StorytellingArcStage {
    type Output = StorytellingArc;

    fn id(&self) -> StageId {
        StageId::StorytellingArc
    }

    fn validate(&self, payload: Value) -> SchemaResult<StorytellingArc> {
        validate_storytelling_arc(payload)
    }

    fn check_quality(&self, output: &StorytellingArc) -> Result<(), String> {
        check_storytelling_arc_quality(output)
    }
}

pub struct IntelligenceGatherer {
    runner: Arc<RetryingStageRunner>,
    prompts: Arc<PromptLibrary>,
}

impl IntelligenceGatherer {
    pub fn new(runner: Arc<RetryingStageRunner>, prompts: Arc<PromptLibrary>) -> Self {
        Self { runner, prompts }
    }

    pub async fn analyze_resonance(
        &self,
        job: &Job,
        scope: StageScope<'_>,
    ) -> Result<ResonanceAnalysis, JobError> {
        let prompt = self.prompts.render(&ResonancePrompt { job })?;
        self.runner.run(&ResonanceStage, &prompt, scope).await
    }

    pub async fn research_company(
        &self,
        job: &Job,
        scope: StageScope<'_>,
    ) -> Result<CompanyResearch, JobError> {
        let prompt = self.prompts.render(&CompanyResearchPrompt { job })?;
        self.runner.run(&CompanyResearchStage, &prompt, scope).await
    }

    pub async fn storytelling_arc(
        &self,
        job: &Job,
        research: &CompanyResearch,
        resonance: &ResonanceAnalysis,
        resume: &TailoredResume,
        scope: StageScope<'_>,
    ) -> Result<StorytellingArc, JobError> {
        let prompt = self.prompts.render(&StorytellingArcPrompt {
            job,
            research,
            resonance,
            resume,
        })?;
        self.runner.run(&StorytellingArcStage, &prompt, scope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::events::TracingObserver;
    use crate::pipeline::incidents::IncidentLog;
    use crate::test_support::{fenced, sample_job, stub_settings, valid_resonance_json, ScriptedClient};
    use serde_json::json;

    #[tokio::test]
    async fn test_resonance_quality_failure_retries_with_feedback() {
        let dir = tempfile::tempdir().unwrap();
        let mut thin = valid_resonance_json();
        thin["power_verbs"] = json!(["led"]);
        let client = Arc::new(ScriptedClient::sequence(vec![
            fenced(&thin),
            fenced(&valid_resonance_json()),
        ]));
        let runner = Arc::new(RetryingStageRunner::new(
            client.clone(),
            Arc::new(stub_settings(dir.path())),
            Arc::new(IncidentLog::new(dir.path().join("incidents.jsonl"))),
            Arc::new(TracingObserver),
        ));
        let gatherer = IntelligenceGatherer::new(runner, Arc::new(PromptLibrary::builtin()));
        let job = sample_job("job-7");
        let scope = StageScope {
            job_id: job.job_id(),
            company: job.company(),
            dir: dir.path(),
        };

        let analysis = gatherer.analyze_resonance(&job, scope).await.unwrap();
        assert!(analysis.power_verbs.len() >= 3);
        assert_eq!(client.calls(), 2);
        assert!(client.prompts()[1].contains("OUTPUT QUALITY ERROR"));
        assert!(client.prompts()[1].contains("power_verbs must have at least 3 items, got 1"));
        assert!(dir.path().join("Job_Resonance_Analysis.json").exists());
    }
}
