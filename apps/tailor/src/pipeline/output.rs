//! OutputOrganizer: job directory naming, final artifact names, and the
//! cleanup that leaves only the deliverables at the top level.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::models::job::Job;
use crate::models::resume::ContactInfo;

pub const DEBUG_DIR: &str = "debug";

/// Keeps alphanumerics, spaces, `-` and `_`; every other character becomes `_`.
pub fn sanitize_component(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

// Byte caps per name part. The longest referral PDF name and the job
// directory name both stay under the 255-byte file name limit.
const MAX_COMPANY_BYTES: usize = 60;
const MAX_TITLE_BYTES: usize = 80;
const MAX_JOB_ID_BYTES: usize = 60;
const MAX_PERSON_NAME_BYTES: usize = 40;

/// Cuts `text` to at most `max` bytes without splitting a character.
fn truncate_bytes(mut text: String, max: usize) -> String {
    if text.len() > max {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

fn capped(text: &str, max: usize) -> String {
    truncate_bytes(sanitize_component(text.trim()), max)
}

/// The job id as it appears in directory and artifact names. Two jobs with
/// the same component would share a directory.
pub fn job_id_component(job_id: &str) -> String {
    capped(job_id, MAX_JOB_ID_BYTES)
}

/// `<company>_<title>_<job_id>`, each part sanitized and capped.
pub fn job_dir_name(job: &Job) -> String {
    format!(
        "{}_{}_{}",
        capped(job.company(), MAX_COMPANY_BYTES),
        capped(job.title(), MAX_TITLE_BYTES),
        job_id_component(job.job_id())
    )
}

/// Canonical deliverable names for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNames {
    pub resume: String,
    pub cover_letter: String,
    pub referral_resume: String,
    pub referral_cover_letter: String,
}

impl ArtifactNames {
    pub fn new(contact: &ContactInfo, job: &Job) -> Self {
        let stem = [
            capped(&contact.first_name, MAX_PERSON_NAME_BYTES),
            capped(&contact.last_name, MAX_PERSON_NAME_BYTES),
            capped(job.company(), MAX_COMPANY_BYTES),
            job_id_component(job.job_id()),
        ]
        .iter()
        .map(|part| part.replace(' ', "_"))
        .collect::<Vec<_>>()
        .join("_");
        Self {
            resume: format!("{stem}_Resume.pdf"),
            cover_letter: format!("{stem}_Cover_Letter.pdf"),
            referral_resume: format!("Referral_{stem}_Resume.pdf"),
            referral_cover_letter: format!("Referral_{stem}_Cover_Letter.pdf"),
        }
    }

    /// Files that stay at the top level: 4 with referral, 2 without.
    pub fn finals(&self, with_referral: bool) -> Vec<&str> {
        let mut finals = vec![self.resume.as_str(), self.cover_letter.as_str()];
        if with_referral {
            finals.push(self.referral_resume.as_str());
            finals.push(self.referral_cover_letter.as_str());
        }
        finals
    }
}

/// Moves every top-level file not named in `keep` into `debug/`.
/// Files are relocated, never deleted. Returns how many were moved.
pub async fn organize(dir: &Path, keep: &[&str]) -> std::io::Result<usize> {
    let debug_dir = dir.join(DEBUG_DIR);
    tokio::fs::create_dir_all(&debug_dir).await?;

    let mut moved = 0;
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        if keep.iter().any(|k| name.as_os_str() == *k) {
            continue;
        }
        let target: PathBuf = debug_dir.join(&name);
        tokio::fs::rename(entry.path(), &target).await?;
        debug!("Moved {} to {}/", name.to_string_lossy(), DEBUG_DIR);
        moved += 1;
    }
    Ok(moved)
}
