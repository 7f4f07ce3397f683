//! JobPipeline: everything that happens to one job, strictly in order.
//!
//! ValidatingInput → GatheringIntelligence → GeneratingResume →
//! GeneratingStorytellingArc → GeneratingCoverLetter → RenderingDocuments →
//! CompilingPrimary → CompilingReferral (optional) → CleaningUp → Done.
//!
//! Any fatal error moves the job straight to `Failed`. There is no resume
//! from a failed state; the job is reprocessed from the start next run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::compiler::DocumentCompiler;
use crate::config::PipelineSettings;
use crate::errors::JobError;
use crate::generation::cover_letter::CoverLetterGenerator;
use crate::generation::intelligence::IntelligenceGatherer;
use crate::generation::prompts::PromptLibrary;
use crate::generation::resume::ResumeGenerator;
use crate::generation::runner::{RetryingStageRunner, StageScope};
use crate::llm_client::GenerationClient;
use crate::models::job::{Job, PendingJob};
use crate::models::profile::MasterProfile;
use crate::pipeline::events::PipelineObserver;
use crate::pipeline::incidents::IncidentLog;
use crate::pipeline::output::{job_dir_name, organize, ArtifactNames};
use crate::pipeline::referral::ReferralVariantBuilder;
use crate::render::{render_cover_letter, render_resume};

const RESUME_TEX: &str = "Resume.tex";
const COVER_LETTER_TEX: &str = "CoverLetter.tex";
const REFERRAL_RESUME_TEX: &str = "Referral_Resume.tex";
const REFERRAL_COVER_LETTER_TEX: &str = "Referral_CoverLetter.tex";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    ValidatingInput,
    GatheringIntelligence,
    GeneratingResume,
    GeneratingStorytellingArc,
    GeneratingCoverLetter,
    RenderingDocuments,
    CompilingPrimary,
    CompilingReferral,
    CleaningUp,
    Done,
    Failed,
}

/// A successfully processed job.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job_id: String,
    pub output_dir: PathBuf,
    /// Final deliverables, in the order they were produced.
    pub artifacts: Vec<PathBuf>,
}

/// External collaborators shared by every job.
#[derive(Clone)]
pub struct Collaborators {
    pub client: Arc<dyn GenerationClient>,
    pub compiler: Arc<dyn DocumentCompiler>,
    pub observer: Arc<dyn PipelineObserver>,
}

pub struct JobPipeline {
    profile: Arc<MasterProfile>,
    intelligence: IntelligenceGatherer,
    resume: ResumeGenerator,
    cover_letter: CoverLetterGenerator,
    referral: ReferralVariantBuilder,
    compiler: Arc<dyn DocumentCompiler>,
    observer: Arc<dyn PipelineObserver>,
    output_root: PathBuf,
}

impl JobPipeline {
    pub fn new(
        settings: Arc<PipelineSettings>,
        prompts: Arc<PromptLibrary>,
        profile: Arc<MasterProfile>,
        referral: ReferralVariantBuilder,
        collaborators: Collaborators,
    ) -> Self {
        let incidents = Arc::new(IncidentLog::new(settings.paths.incident_log.clone()));
        let runner = Arc::new(RetryingStageRunner::new(
            collaborators.client,
            settings.clone(),
            incidents,
            collaborators.observer.clone(),
        ));
        Self {
            profile,
            intelligence: IntelligenceGatherer::new(runner.clone(), prompts.clone()),
            resume: ResumeGenerator::new(runner.clone(), prompts.clone()),
            cover_letter: CoverLetterGenerator::new(runner, prompts, settings.cover_letter_min_chars),
            referral,
            compiler: collaborators.compiler,
            observer: collaborators.observer,
            output_root: settings.paths.output_dir.clone(),
        }
    }

    /// Processes one job. Errors are returned, never panicked, so the caller
    /// can record them without affecting other jobs.
    pub async fn run(&self, pending: &PendingJob) -> Result<JobOutcome, JobError> {
        let job_id = pending.display_id();
        self.observer.on_job_start(&job_id);
        match self.execute(&job_id, pending).await {
            Ok(outcome) => {
                self.enter(&job_id, JobState::Done);
                self.observer.on_job_complete(&job_id, &outcome.output_dir);
                Ok(outcome)
            }
            Err(e) => {
                self.enter(&job_id, JobState::Failed);
                self.observer.on_job_failed(&job_id, &e);
                Err(e)
            }
        }
    }

    fn enter(&self, job_id: &str, state: JobState) {
        self.observer.on_job_state(job_id, state);
    }

    async fn execute(&self, job_id: &str, pending: &PendingJob) -> Result<JobOutcome, JobError> {
        self.enter(job_id, JobState::ValidatingInput);
        let job = Job::from_pending(pending)?;

        let dir = self.output_root.join(job_dir_name(&job));
        tokio::fs::create_dir_all(&dir).await?;
        info!(job_id, "Output directory: {}", dir.display());
        let scope = StageScope {
            job_id: job.job_id(),
            company: job.company(),
            dir: &dir,
        };

        self.enter(job_id, JobState::GatheringIntelligence);
        let resonance = self.intelligence.analyze_resonance(&job, scope).await?;
        let research = self.intelligence.research_company(&job, scope).await?;

        self.enter(job_id, JobState::GeneratingResume);
        let resume = self
            .resume
            .generate(&job, &self.profile, &resonance, scope)
            .await?;

        self.enter(job_id, JobState::GeneratingStorytellingArc);
        let arc = self
            .intelligence
            .storytelling_arc(&job, &research, &resonance, &resume, scope)
            .await?;

        self.enter(job_id, JobState::GeneratingCoverLetter);
        let letter = self
            .cover_letter
            .generate(&job, &research, &resonance, &arc, &resume, scope)
            .await?;

        self.enter(job_id, JobState::RenderingDocuments);
        tokio::fs::write(dir.join(RESUME_TEX), render_resume(&resume)).await?;
        tokio::fs::write(
            dir.join(COVER_LETTER_TEX),
            render_cover_letter(&resume.contact_info, &letter),
        )
        .await?;
        let referral = self.referral.render(&resume, &letter);
        if let Some(docs) = &referral {
            tokio::fs::write(dir.join(REFERRAL_RESUME_TEX), &docs.resume).await?;
            tokio::fs::write(dir.join(REFERRAL_COVER_LETTER_TEX), &docs.cover_letter).await?;
        }

        let names = ArtifactNames::new(&resume.contact_info, &job);
        let mut artifacts = Vec::with_capacity(4);

        self.enter(job_id, JobState::CompilingPrimary);
        artifacts.push(self.compile(&dir, RESUME_TEX, &names.resume).await?);
        artifacts.push(self.compile(&dir, COVER_LETTER_TEX, &names.cover_letter).await?);

        if referral.is_some() {
            self.enter(job_id, JobState::CompilingReferral);
            artifacts.push(
                self.compile(&dir, REFERRAL_RESUME_TEX, &names.referral_resume)
                    .await?,
            );
            artifacts.push(
                self.compile(&dir, REFERRAL_COVER_LETTER_TEX, &names.referral_cover_letter)
                    .await?,
            );
        }

        self.enter(job_id, JobState::CleaningUp);
        let moved = organize(&dir, &names.finals(referral.is_some())).await?;
        info!(job_id, "Moved {} intermediate files to debug/", moved);

        Ok(JobOutcome {
            job_id: job.job_id().to_string(),
            output_dir: dir,
            artifacts,
        })
    }

    /// Compiles one markup file and renames the result to its final name.
    async fn compile(&self, dir: &Path, tex: &str, final_name: &str) -> Result<PathBuf, JobError> {
        let pdf = self
            .compiler
            .compile(&dir.join(tex), dir)
            .await
            .map_err(|source| JobError::Compilation {
                document: tex.to_string(),
                source,
            })?;
        let target = dir.join(final_name);
        tokio::fs::rename(&pdf, &target).await?;
        Ok(target)
    }
}
