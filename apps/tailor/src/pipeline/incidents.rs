//! Append-only incident log of schema-validation failures.
//!
//! One JSON object per line. Written by every concurrent job, never read by
//! the pipeline; it exists for offline analysis of recurring failures.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::generation::runner::StageId;
use crate::schema::Violation;

#[derive(Debug, Clone, Serialize)]
pub struct Incident {
    pub timestamp: DateTime<Utc>,
    pub step_name: String,
    pub job_id: String,
    pub company_name: String,
    pub attempt: u32,
    pub error_count: usize,
    pub errors: Vec<Violation>,
}

impl Incident {
    pub fn new(stage: StageId, job_id: &str, company: &str, attempt: u32, violations: &[Violation]) -> Self {
        Self {
            timestamp: Utc::now(),
            step_name: stage.to_string(),
            job_id: job_id.to_string(),
            company_name: company.to_string(),
            attempt,
            error_count: violations.len(),
            errors: violations.to_vec(),
        }
    }
}

pub struct IncidentLog {
    path: PathBuf,
    // Serializes writers so lines never interleave.
    lock: Mutex<()>,
}

impl IncidentLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub async fn append(&self, incident: &Incident) -> std::io::Result<()> {
        let mut line = serde_json::to_vec(incident)?;
        line.push(b'\n');

        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ViolationKind;
    use std::sync::Arc;

    fn violation(field: &str) -> Violation {
        Violation {
            field: field.to_string(),
            message: "expected exactly 4 entries, got 3".to_string(),
            kind: ViolationKind::Count,
        }
    }

    #[tokio::test]
    async fn test_incident_record_format() {
        let dir = tempfile::tempdir().unwrap();
        let log = IncidentLog::new(dir.path().join("logs/incidents.jsonl"));
        let incident = Incident::new(
            StageId::Resume,
            "job-9",
            "Acme",
            2,
            &[violation("projects.1.bullet_points")],
        );
        log.append(&incident).await.unwrap();

        let text = std::fs::read_to_string(dir.path().join("logs/incidents.jsonl")).unwrap();
        let record: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(record["step_name"], "Resume Generation");
        assert_eq!(record["job_id"], "job-9");
        assert_eq!(record["company_name"], "Acme");
        assert_eq!(record["attempt"], 2);
        assert_eq!(record["error_count"], 1);
        assert_eq!(record["errors"][0]["field"], "projects.1.bullet_points");
        assert_eq!(record["errors"][0]["type"], "count");
        assert!(record["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(IncidentLog::new(dir.path().join("incidents.jsonl")));
        let mut handles = Vec::new();
        for i in 0..20 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                let incident = Incident::new(StageId::CompanyResearch, &format!("job-{i}"), "Acme", 1, &[violation("core_values")]);
                log.append(&incident).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let text = std::fs::read_to_string(dir.path().join("incidents.jsonl")).unwrap();
        assert_eq!(text.lines().count(), 20);
        for line in text.lines() {
            serde_json::from_str::<serde_json::Value>(line).expect("every line is a full record");
        }
    }
}
