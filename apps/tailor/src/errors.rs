use std::time::Duration;

use thiserror::Error;

use crate::compiler::CompileError;
use crate::generation::prompts::PromptError;
use crate::generation::runner::StageId;
use crate::llm_client::GenerationError;
use crate::models::job::InputValidationError;

/// Which gate rejected the last attempt of an exhausted stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The response could not be parsed into structured data.
    Extraction,
    /// The structured data violated field-level constraints.
    SchemaViolation,
    /// Well-formed data that failed a semantic minimum.
    QualityThreshold,
}

/// Job-fatal error. Returned from `JobPipeline::run` and recorded by the
/// batch orchestrator; never propagated to sibling jobs.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Invalid job input: {0}")]
    InvalidInput(#[from] InputValidationError),

    #[error("{stage} failed after {attempts} attempts: {detail}")]
    StageExhausted {
        stage: StageId,
        attempts: u32,
        kind: FailureKind,
        detail: String,
    },

    #[error("Generation service unavailable during {stage}: {source}")]
    CollaboratorUnavailable {
        stage: StageId,
        #[source]
        source: GenerationError,
    },

    #[error("Failed to compile {document}: {source}")]
    Compilation {
        document: String,
        #[source]
        source: CompileError,
    },

    #[error("Failed to build prompt: {0}")]
    Prompt(#[from] PromptError),

    #[error("Job exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl JobError {
    /// Stable machine-readable code recorded in the batch summary.
    pub fn code(&self) -> &'static str {
        match self {
            JobError::InvalidInput(_) => "INPUT_VALIDATION_ERROR",
            JobError::StageExhausted { kind, .. } => match kind {
                FailureKind::Extraction => "EXTRACTION_ERROR",
                FailureKind::SchemaViolation => "SCHEMA_VIOLATION",
                FailureKind::QualityThreshold => "QUALITY_THRESHOLD",
            },
            JobError::CollaboratorUnavailable { .. } => "COLLABORATOR_UNAVAILABLE",
            JobError::Compilation { .. } => "COMPILATION_ERROR",
            JobError::DeadlineExceeded(_) => "DEADLINE_EXCEEDED",
            JobError::Io(_) => "IO_ERROR",
            JobError::Prompt(_) | JobError::Serialization(_) | JobError::Internal(_) => {
                "INTERNAL_ERROR"
            }
        }
    }
}
