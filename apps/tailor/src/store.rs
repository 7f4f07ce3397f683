//! Job queue and profile loading over local JSON files.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::io::Write;
use tokio::sync::Mutex;
use tracing::info;

use crate::models::job::PendingJob;
use crate::models::profile::MasterProfile;

const STATUS_PROCESSED: &str = "processed";

/// Source of pending jobs.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn list_pending(&self) -> Result<Vec<PendingJob>>;
    async fn mark_processed(&self, job_id: &str) -> Result<()>;
}

/// Applications file: a JSON array of job records. Only records whose
/// `status` is `"pending"` are listed. Unknown fields survive rewrites.
pub struct FileJobStore {
    path: PathBuf,
    // Serializes read-modify-write cycles across concurrent jobs.
    lock: Mutex<()>,
}

impl FileJobStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<Vec<Value>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read applications file {}", self.path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Applications file {} is not a JSON array", self.path.display()))
    }

    /// Writes to a temp file beside the target, then renames it into place.
    async fn write_all(&self, records: Vec<Value>) -> Result<()> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
            serde_json::to_writer_pretty(&mut tmp, &records)?;
            tmp.write_all(b"\n")?;
            tmp.persist(&path)?;
            Ok(())
        })
        .await
        .context("applications writer task failed")?
    }
}

#[async_trait]
impl JobQueue for FileJobStore {
    async fn list_pending(&self) -> Result<Vec<PendingJob>> {
        let _guard = self.lock.lock().await;
        let records = self.read_all().await?;
        let mut pending = Vec::new();
        for (i, record) in records.into_iter().enumerate() {
            let job: PendingJob = serde_json::from_value(record)
                .with_context(|| format!("Applications record {i} is malformed"))?;
            if job.is_pending() {
                pending.push(job);
            }
        }
        info!("Found {} pending job(s) in {}", pending.len(), self.path.display());
        Ok(pending)
    }

    async fn mark_processed(&self, job_id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_all().await?;
        let mut found = false;
        for record in records.iter_mut() {
            if record.get("job_id").and_then(Value::as_str) == Some(job_id) {
                record["status"] = Value::String(STATUS_PROCESSED.to_string());
                found = true;
            }
        }
        if !found {
            bail!("job {job_id} not found in {}", self.path.display());
        }
        self.write_all(records).await
    }
}

/// Loads the candidate's master profile. It must be a JSON object.
pub fn load_master_profile(path: &Path) -> Result<MasterProfile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read master profile {}", path.display()))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("Master profile {} is not valid JSON", path.display()))?;
    MasterProfile::from_value(value)
        .with_context(|| format!("Master profile {} must be a JSON object", path.display()))
}
