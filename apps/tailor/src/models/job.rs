//! Job records: the loosely-typed queue entry and the validated, immutable `Job`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

const TITLE_MIN_CHARS: usize = 3;
const TITLE_MAX_CHARS: usize = 200;
const COMPANY_MIN_CHARS: usize = 2;
const COMPANY_MAX_CHARS: usize = 100;
const DESCRIPTION_MIN_CHARS: usize = 100;
const DESCRIPTION_MAX_CHARS: usize = 50_000;

/// A job record as it sits in the external queue. Every field is optional
/// here; `Job::from_pending` decides whether the record may enter the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PendingJob {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub job_description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Queue-specific fields (source URL, salary, ...) carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PendingJob {
    /// Best-effort label for logs and failure records, even for invalid input.
    pub fn display_id(&self) -> String {
        self.job_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or("unknown")
            .to_string()
    }

    pub fn is_pending(&self) -> bool {
        self.status.as_deref() == Some("pending")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputValidationError {
    #[error("{0} is required and must be a non-empty string")]
    MissingField(&'static str),

    #[error("{field} must be at least {min} characters, got {actual}")]
    TooShort {
        field: &'static str,
        min: usize,
        actual: usize,
    },

    #[error("{field} is too long (max {max} chars), got {actual} chars")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    #[error("job_id {0} appears more than once in the batch")]
    DuplicateJobId(String),

    #[error("output directory {0} is already claimed by another job in the batch")]
    OutputDirectoryTaken(String),
}

/// A validated job posting. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    job_id: String,
    title: String,
    company: String,
    description: String,
}

impl Job {
    /// Validates a queue record. Minimums are checked against the trimmed value,
    /// maximums against the raw value.
    pub fn from_pending(pending: &PendingJob) -> Result<Self, InputValidationError> {
        let job_id = required("job_id", pending.job_id.as_deref())?;
        let title = required("job_title", pending.job_title.as_deref())?;
        let company = required("company_name", pending.company_name.as_deref())?;
        let description = required("job_description", pending.job_description.as_deref())?;

        check_bounds("job_title", title, TITLE_MIN_CHARS, TITLE_MAX_CHARS)?;
        check_bounds("company_name", company, COMPANY_MIN_CHARS, COMPANY_MAX_CHARS)?;
        check_bounds(
            "job_description",
            description,
            DESCRIPTION_MIN_CHARS,
            DESCRIPTION_MAX_CHARS,
        )?;

        Ok(Job {
            job_id: job_id.trim().to_string(),
            title: title.to_string(),
            company: company.to_string(),
            description: description.to_string(),
        })
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn company(&self) -> &str {
        &self.company
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

fn required<'a>(
    field: &'static str,
    value: Option<&'a str>,
) -> Result<&'a str, InputValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(InputValidationError::MissingField(field)),
    }
}

fn check_bounds(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), InputValidationError> {
    let trimmed = value.trim().chars().count();
    if trimmed < min {
        return Err(InputValidationError::TooShort {
            field,
            min,
            actual: trimmed,
        });
    }
    let raw = value.chars().count();
    if raw > max {
        return Err(InputValidationError::TooLong {
            field,
            max,
            actual: raw,
        });
    }
    Ok(())
}
