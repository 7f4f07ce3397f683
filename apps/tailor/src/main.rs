mod compiler;
mod config;
mod errors;
mod generation;
mod llm_client;
mod models;
mod pipeline;
mod render;
mod schema;
mod store;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::compiler::PdfLatexCompiler;
use crate::config::{Config, PipelineSettings};
use crate::generation::prompts::PromptLibrary;
use crate::llm_client::HttpGenerationClient;
use crate::pipeline::batch::BatchOrchestrator;
use crate::pipeline::events::{PipelineObserver, TracingObserver};
use crate::pipeline::job::{Collaborators, JobPipeline};
use crate::pipeline::referral::ReferralVariantBuilder;
use crate::store::{load_master_profile, FileJobStore, JobQueue};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting tailor v{}", env!("CARGO_PKG_VERSION"));

    let settings = Arc::new(PipelineSettings::load(&config.pipeline_config)?);
    let paths = &settings.paths;

    let prompts = PromptLibrary::load(paths.prompts_dir.as_deref(), &settings.humanization)
        .context("Failed to load prompt templates")?;
    let profile = load_master_profile(&paths.master_profile)?;

    let referral = ReferralVariantBuilder::from_file(&paths.referral_contact);

    let client = HttpGenerationClient::new(&config, &settings)
        .context("Failed to build generation client")?;
    info!("Generation client initialized (default model: {})", settings.default_model);

    let compiler = PdfLatexCompiler::new(
        settings.latex.program.clone(),
        settings.compile_timeout(),
        paths.latex_assets_dir.clone(),
    );

    let observer: Arc<dyn PipelineObserver> = Arc::new(TracingObserver);
    let pipeline = JobPipeline::new(
        settings.clone(),
        Arc::new(prompts),
        Arc::new(profile),
        referral,
        Collaborators {
            client: Arc::new(client),
            compiler: Arc::new(compiler),
            observer: observer.clone(),
        },
    );

    let queue = Arc::new(FileJobStore::new(paths.applications.clone()));
    let jobs = queue.list_pending().await?;
    if jobs.is_empty() {
        info!("No pending jobs in {}", paths.applications.display());
        return Ok(());
    }

    let result = BatchOrchestrator::new(Arc::new(pipeline), observer, settings.max_concurrent_jobs)
        .with_job_timeout(settings.job_timeout())
        .with_queue(queue)
        .run(jobs)
        .await;

    for failure in &result.failures {
        warn!(
            job_id = %failure.job_id,
            code = failure.code,
            "Job failed: {}",
            failure.reason
        );
    }
    info!(
        run_id = %result.run_id,
        "Done: {}/{} job(s) succeeded",
        result.succeeded,
        result.attempted
    );

    Ok(())
}
