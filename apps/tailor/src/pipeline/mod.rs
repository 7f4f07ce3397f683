// Job orchestration: one JobPipeline per job, many jobs per BatchOrchestrator.
// Everything here reports progress through events::PipelineObserver.

pub mod batch;
pub mod events;
pub mod incidents;
pub mod job;
pub mod output;
pub mod referral;
