//! The tailored resume as emitted by the resume stage.
//!
//! These types only describe the shape. Field rules (counts, lengths,
//! sanitization, phone format) live in `schema::resume`; a value of these
//! types that came out of `validate_tailored_resume` has passed all of them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub location: String,
    pub linkedin_url: String,
    pub github_url: String,
    pub portfolio_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Education {
    pub institution: String,
    pub degree: String,
    pub start_date: String,
    /// Must be `graduation_date`, not `end_date`; models get this wrong often.
    pub graduation_date: String,
    #[serde(default)]
    pub gpa: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkExperience {
    pub job_title: String,
    pub company: String,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub location: Option<String>,
    pub bullet_points: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub project_name: String,
    #[serde(default)]
    pub technologies: Vec<String>,
    pub project_url: String,
    #[serde(default)]
    pub description: Option<String>,
    pub bullet_points: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TailoredResume {
    pub contact_info: ContactInfo,
    /// Always empty after validation: the page space goes to bullets.
    #[serde(default)]
    pub professional_summaries: String,
    pub education: Vec<Education>,
    /// Category name -> comma-separated skills.
    pub skills: BTreeMap<String, String>,
    pub work_experience: Vec<WorkExperience>,
    pub projects: Vec<Project>,
}
