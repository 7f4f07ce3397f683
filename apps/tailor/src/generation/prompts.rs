//! Prompt templates for the five generation stages, plus retry feedback.
//!
//! Templates use `{name}` placeholders. Every stage declares its placeholder
//! set and takes a typed parameter struct; a template whose placeholders
//! differ from the declared set is rejected when the library is built, so a
//! misspelt placeholder can never render as a silent no-op.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{HumanizationSettings, HumanizationTarget};
use crate::generation::runner::StageId;
use crate::llm_client::prompts::{JSON_OUTPUT_INSTRUCTION, PLAIN_TEXT_INSTRUCTION, SEPARATOR};
use crate::models::intelligence::{CompanyResearch, ResonanceAnalysis, StorytellingArc};
use crate::models::job::Job;
use crate::models::profile::MasterProfile;
use crate::models::resume::TailoredResume;
use crate::schema::Violation;

const HUMANIZATION_LEVELS: [&str; 3] = ["low", "medium", "high"];

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("{stage} template uses unknown placeholder {{{placeholder}}}")]
    UnknownPlaceholder { stage: StageId, placeholder: String },

    #[error("{stage} template is missing placeholder {{{placeholder}}}")]
    MissingPlaceholder { stage: StageId, placeholder: &'static str },

    #[error("No value supplied for {{{placeholder}}} in {stage} prompt")]
    MissingValue { stage: StageId, placeholder: String },

    #[error("Failed to read prompt file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize prompt input: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in templates
// ────────────────────────────────────────────────────────────────────────────

const JOB_RESONANCE_TEMPLATE: &str = r#"You are analysing a job posting for {company_name} to find the language that will resonate with its hiring team.

Read the posting and extract:
- emotional_keywords: 3-15 words or phrases carrying emotional weight ("passionate", "ownership")
- cultural_values: at least 2 values the team signals it cares about
- hidden_requirements: at least 2 expectations implied but never stated outright
- power_verbs: at least 3 action verbs the posting favours
- technical_keywords: at least 3 technologies, tools or concepts named in the posting

Every list item must be a non-empty string.

Return a JSON object with exactly these keys:
{"emotional_keywords": [], "cultural_values": [], "hidden_requirements": [], "power_verbs": [], "technical_keywords": []}

JOB POSTING:
{job_description}"#;

const COMPANY_RESEARCH_TEMPLATE: &str = r#"Research {company_name} using the job posting below and your own knowledge of the company.

Return a JSON object with these keys:
- company_name: the company's name
- mission_statement: the mission in one or two sentences (at least 20 characters)
- core_values: 2-10 values
- tech_stack: technologies the company is known to use (may be empty)
- culture_keywords: words describing the culture (may be empty)
- recent_news: notable recent developments (may be empty)
- mission_keywords: short phrases drawn from the mission
- domain_context: one paragraph on the industry and problem space

No list may contain empty strings.

JOB POSTING:
{job_description}"#;

const RESUME_TEMPLATE: &str = r#"You are tailoring a candidate's resume for a role at {company_name}.

HARD RULES (the output is rejected if any is broken):
- work_experience: exactly 3 entries, each with exactly 4 bullet_points
- projects: exactly 3 entries, each with exactly 4 bullet_points
- every bullet point at most 118 characters
- project technologies, joined with ", ", at most 70 characters
- skills: an object of category -> comma-separated skills; category names at most 30 characters, skill strings at most 90
- education: at least 1 entry
- professional_summaries: must be an empty string
- phone: a 10-digit number
- never use any of these characters: < > [ ] { } \ | ~ ^
- only use facts present in the master profile

Use the resonance analysis to choose wording that mirrors the employer's language.

JOB POSTING:
{job_description}

MASTER PROFILE:
{master_profile}

RESONANCE ANALYSIS:
{resonance_analysis}

Return one JSON object with keys contact_info, professional_summaries, education, skills, work_experience, projects."#;

const STORYTELLING_ARC_TEMPLATE: &str = r#"Design the narrative for a cover letter to {company_name}.

Use the job posting, the company research, the resonance analysis and the tailored resume below. Every proof point must come from the tailored resume.

Return a JSON object with these keys:
- hook: an opening that connects the candidate to the company's mission (at least 50 characters)
- bridge: how the candidate's path leads to this role (at least 50 characters)
- proof_points: 2-3 concrete achievements, each at least 30 characters
- vision: what the candidate would build at the company (at least 50 characters)
- call_to_action: a closing invitation (at least 20 characters)

JOB POSTING:
{job_description}

COMPANY RESEARCH:
{company_research}

RESONANCE ANALYSIS:
{resonance_analysis}

TAILORED RESUME:
{tailored_resume}"#;

const COVER_LETTER_TEMPLATE: &str = r#"Write a cover letter for a role at {company_name}.

Follow the storytelling arc: open with the hook, then the bridge, then the proof points, then the vision, and close with the call to action. Separate paragraphs with a blank line. Do not include a salutation, date, address block or signature; those are added when the letter is typeset.

STORYTELLING ARC:
{storytelling_arc}

TAILORED RESUME:
{tailored_resume}

COMPANY RESEARCH:
{company_research}

RESONANCE ANALYSIS:
{resonance_analysis}

JOB POSTING:
{job_description}"#;

/// Placeholders each stage template must use, no more and no fewer.
pub fn placeholders(stage: StageId) -> &'static [&'static str] {
    match stage {
        StageId::JobResonance | StageId::CompanyResearch => &["company_name", "job_description"],
        StageId::Resume => &[
            "company_name",
            "job_description",
            "master_profile",
            "resonance_analysis",
        ],
        StageId::StorytellingArc => &[
            "company_name",
            "job_description",
            "company_research",
            "resonance_analysis",
            "tailored_resume",
        ],
        StageId::CoverLetter => &[
            "company_name",
            "job_description",
            "company_research",
            "resonance_analysis",
            "storytelling_arc",
            "tailored_resume",
        ],
    }
}

fn builtin_template(stage: StageId) -> &'static str {
    match stage {
        StageId::JobResonance => JOB_RESONANCE_TEMPLATE,
        StageId::CompanyResearch => COMPANY_RESEARCH_TEMPLATE,
        StageId::Resume => RESUME_TEMPLATE,
        StageId::StorytellingArc => STORYTELLING_ARC_TEMPLATE,
        StageId::CoverLetter => COVER_LETTER_TEMPLATE,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Typed parameters
// ────────────────────────────────────────────────────────────────────────────

/// Values for one stage's placeholders.
pub trait PromptParams {
    fn stage(&self) -> StageId;
    fn values(&self) -> Result<Vec<(&'static str, String)>, PromptError>;
}

pub struct ResonancePrompt<'a> {
    pub job: &'a Job,
}

pub struct CompanyResearchPrompt<'a> {
    pub job: &'a Job,
}

pub struct ResumePrompt<'a> {
    pub job: &'a Job,
    pub profile: &'a MasterProfile,
    pub resonance: &'a ResonanceAnalysis,
}

pub struct StorytellingArcPrompt<'a> {
    pub job: &'a Job,
    pub research: &'a CompanyResearch,
    pub resonance: &'a ResonanceAnalysis,
    pub resume: &'a TailoredResume,
}

pub struct CoverLetterPrompt<'a> {
    pub job: &'a Job,
    pub research: &'a CompanyResearch,
    pub resonance: &'a ResonanceAnalysis,
    pub arc: &'a StorytellingArc,
    pub resume: &'a TailoredResume,
}

fn fenced_text(text: &str) -> String {
    format!("```\n{text}\n```")
}

fn fenced_json<T: Serialize>(value: &T) -> Result<String, PromptError> {
    Ok(format!("```json\n{}\n```", serde_json::to_string_pretty(value)?))
}

fn job_values(job: &Job) -> Vec<(&'static str, String)> {
    vec![
        ("company_name", job.company().to_string()),
        ("job_description", fenced_text(job.description())),
    ]
}

impl PromptParams for ResonancePrompt<'_> {
    fn stage(&self) -> StageId {
        StageId::JobResonance
    }

    fn values(&self) -> Result<Vec<(&'static str, String)>, PromptError> {
        Ok(job_values(self.job))
    }
}

impl PromptParams for CompanyResearchPrompt<'_> {
    fn stage(&self) -> StageId {
        StageId::CompanyResearch
    }

    fn values(&self) -> Result<Vec<(&'static str, String)>, PromptError> {
        Ok(job_values(self.job))
    }
}

impl PromptParams for ResumePrompt<'_> {
    fn stage(&self) -> StageId {
        StageId::Resume
    }

    fn values(&self) -> Result<Vec<(&'static str, String)>, PromptError> {
        let mut values = job_values(self.job);
        values.push(("master_profile", fenced_json(self.profile)?));
        values.push(("resonance_analysis", fenced_json(self.resonance)?));
        Ok(values)
    }
}

impl PromptParams for StorytellingArcPrompt<'_> {
    fn stage(&self) -> StageId {
        StageId::StorytellingArc
    }

    fn values(&self) -> Result<Vec<(&'static str, String)>, PromptError> {
        let mut values = job_values(self.job);
        values.push(("company_research", fenced_json(self.research)?));
        values.push(("resonance_analysis", fenced_json(self.resonance)?));
        values.push(("tailored_resume", fenced_json(self.resume)?));
        Ok(values)
    }
}

impl PromptParams for CoverLetterPrompt<'_> {
    fn stage(&self) -> StageId {
        StageId::CoverLetter
    }

    fn values(&self) -> Result<Vec<(&'static str, String)>, PromptError> {
        let mut values = job_values(self.job);
        values.push(("company_research", fenced_json(self.research)?));
        values.push(("resonance_analysis", fenced_json(self.resonance)?));
        values.push(("storytelling_arc", fenced_json(self.arc)?));
        values.push(("tailored_resume", fenced_json(self.resume)?));
        Ok(values)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Library
// ────────────────────────────────────────────────────────────────────────────

/// Validated templates for every stage, shared read-only by all jobs.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    templates: HashMap<StageId, String>,
    humanization: Option<String>,
    humanize: Vec<HumanizationTarget>,
}

impl PromptLibrary {
    /// Built-in templates, no humanization.
    pub fn builtin() -> Self {
        let templates = StageId::ALL
            .iter()
            .map(|&stage| (stage, builtin_template(stage).to_string()))
            .collect();
        Self {
            templates,
            humanization: None,
            humanize: Vec::new(),
        }
    }

    /// Built-in templates with overrides from `prompts_dir/<template>.txt`,
    /// and the humanization text if enabled.
    pub fn load(
        prompts_dir: Option<&Path>,
        humanization: &HumanizationSettings,
    ) -> Result<Self, PromptError> {
        let mut library = Self::builtin();

        if let Some(dir) = prompts_dir {
            for stage in StageId::ALL {
                let path = dir.join(format!("{}.txt", stage.template_name()));
                if !path.exists() {
                    continue;
                }
                let text = std::fs::read_to_string(&path)
                    .map_err(|source| PromptError::Io { path: path.clone(), source })?;
                info!("Loaded prompt override {}", path.display());
                library.templates.insert(stage, text);
            }
        }

        for stage in StageId::ALL {
            check_placeholders(stage, library.template(stage))?;
        }

        if humanization.enabled {
            library.humanization = load_humanization(prompts_dir, &humanization.level);
            library.humanize = humanization.apply_to.clone();
        }
        Ok(library)
    }

    fn template(&self, stage: StageId) -> &str {
        self.templates
            .get(&stage)
            .map(String::as_str)
            .unwrap_or_else(|| builtin_template(stage))
    }

    /// Renders the base prompt for a stage: filled template, output-format
    /// instruction, and humanization when it applies to the stage.
    pub fn render(&self, params: &dyn PromptParams) -> Result<String, PromptError> {
        let stage = params.stage();
        let values = params.values()?;
        let mut prompt = fill(stage, self.template(stage), &values)?;

        prompt.push_str("\n\n");
        prompt.push_str(match stage {
            StageId::CoverLetter => PLAIN_TEXT_INSTRUCTION,
            _ => JSON_OUTPUT_INSTRUCTION,
        });

        if let Some(text) = self.humanization_for(stage) {
            prompt = format!("{prompt}\n\n{SEPARATOR}\n{text}\n\n{SEPARATOR}\n");
        }
        Ok(prompt)
    }

    fn humanization_for(&self, stage: StageId) -> Option<&str> {
        let target = match stage {
            StageId::Resume => HumanizationTarget::Resume,
            StageId::CoverLetter => HumanizationTarget::CoverLetter,
            _ => return None,
        };
        if self.humanize.contains(&target) {
            self.humanization.as_deref()
        } else {
            None
        }
    }
}

fn load_humanization(prompts_dir: Option<&Path>, level: &str) -> Option<String> {
    let level = if HUMANIZATION_LEVELS.contains(&level) {
        level
    } else {
        warn!("Invalid humanization level '{}', defaulting to 'medium'", level);
        "medium"
    };
    let Some(dir) = prompts_dir else {
        warn!("Humanization enabled but no prompts_dir configured; disabled for this run");
        return None;
    };
    let path = dir.join(format!("humanization_{level}.txt"));
    match std::fs::read_to_string(&path) {
        Ok(text) => {
            info!("Loaded humanization prompt {}", path.display());
            Some(text)
        }
        Err(e) => {
            warn!(
                "Humanization prompt {} unavailable ({}); disabled for this run",
                path.display(),
                e
            );
            None
        }
    }
}

/// Every `{name}` token in `template`, where `name` is lowercase ASCII and `_`.
/// Braces around anything else (JSON examples) are ignored.
fn placeholder_tokens(template: &str) -> Vec<(usize, usize, &str)> {
    let bytes = template.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            let start = i + 1;
            let mut j = start;
            while j < bytes.len() && (bytes[j].is_ascii_lowercase() || bytes[j] == b'_') {
                j += 1;
            }
            if j > start && j < bytes.len() && bytes[j] == b'}' {
                tokens.push((i, j + 1, &template[start..j]));
                i = j + 1;
                continue;
            }
        }
        i += 1;
    }
    tokens
}

fn check_placeholders(stage: StageId, template: &str) -> Result<(), PromptError> {
    let declared = placeholders(stage);
    let used: BTreeSet<&str> = placeholder_tokens(template)
        .into_iter()
        .map(|(_, _, name)| name)
        .collect();
    if let Some(unknown) = used.iter().find(|name| !declared.contains(name)) {
        return Err(PromptError::UnknownPlaceholder {
            stage,
            placeholder: unknown.to_string(),
        });
    }
    if let Some(&missing) = declared.iter().find(|name| !used.contains(*name)) {
        return Err(PromptError::MissingPlaceholder {
            stage,
            placeholder: missing,
        });
    }
    Ok(())
}

/// Single-pass substitution; substituted text is never re-scanned.
fn fill(stage: StageId, template: &str, values: &[(&'static str, String)]) -> Result<String, PromptError> {
    let mut out = String::with_capacity(template.len());
    let mut cursor = 0;
    for (start, end, name) in placeholder_tokens(template) {
        let value = values
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
            .ok_or_else(|| PromptError::MissingValue {
                stage,
                placeholder: name.to_string(),
            })?;
        out.push_str(&template[cursor..start]);
        out.push_str(value);
        cursor = end;
    }
    out.push_str(&template[cursor..]);
    Ok(out)
}

// ────────────────────────────────────────────────────────────────────────────
// Retry feedback
// ────────────────────────────────────────────────────────────────────────────

/// Puts feedback ahead of the base prompt so the model reads it first.
pub fn with_feedback(base: &str, feedback: &str) -> String {
    format!("{feedback}\n\n{base}")
}

pub fn malformed_output_feedback(error: &str) -> String {
    format!(
        "{SEPARATOR}\n# JSON PARSING ERROR\n{SEPARATOR}\n\n\
         The previous response was not valid JSON.\nError: {error}\n\n\
         Please ensure your response contains ONLY valid JSON with no additional text.\n{SEPARATOR}"
    )
}

pub fn violation_feedback(stage: StageId, violations: &[Violation]) -> String {
    let lines = violations
        .iter()
        .map(|v| format!("  • {}: {}", v.field, v.message))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "{SEPARATOR}\nVALIDATION ERRORS TO FIX\n{SEPARATOR}\n\n\
         The previous {stage} attempt had {} validation error(s):\n\n{lines}\n\n\
         Fix these issues and regenerate the complete JSON output.\n{SEPARATOR}",
        violations.len()
    )
}

pub fn quality_feedback(reason: &str) -> String {
    format!(
        "{SEPARATOR}\n# OUTPUT QUALITY ERROR\n{SEPARATOR}\n\n{reason}\n\n\
         Please provide more detailed and meaningful content that meets the quality thresholds.\n{SEPARATOR}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ViolationKind;
    use crate::test_support::{sample_job, sample_profile, valid_resonance_json};

    fn resonance() -> ResonanceAnalysis {
        serde_json::from_value(valid_resonance_json()).unwrap()
    }

    #[test]
    fn test_builtin_templates_declare_exact_placeholders() {
        for stage in StageId::ALL {
            check_placeholders(stage, builtin_template(stage))
                .unwrap_or_else(|e| panic!("{stage}: {e}"));
        }
    }

    #[test]
    fn test_render_resume_fills_every_placeholder() {
        let job = sample_job("job-1");
        let profile = sample_profile();
        let analysis = resonance();
        let prompt = PromptLibrary::builtin()
            .render(&ResumePrompt {
                job: &job,
                profile: &profile,
                resonance: &analysis,
            })
            .unwrap();
        assert!(prompt.contains(job.company()));
        assert!(prompt.contains("```json"));
        assert!(!prompt.contains("{master_profile}"));
        assert!(!prompt.contains("{resonance_analysis}"));
        assert!(prompt.ends_with(JSON_OUTPUT_INSTRUCTION));
    }

    #[test]
    fn test_substituted_values_are_not_rescanned() {
        let values = vec![
            ("company_name", "{job_description}".to_string()),
            ("job_description", "text".to_string()),
        ];
        let out = fill(StageId::JobResonance, "{company_name} / {job_description}", &values).unwrap();
        assert_eq!(out, "{job_description} / text");
    }

    #[test]
    fn test_json_braces_are_not_placeholders() {
        let tokens = placeholder_tokens(r#"{"hook": ""} {} {Name} {company_name}"#);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].2, "company_name");
    }

    #[test]
    fn test_override_with_typo_is_rejected_at_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("research_company.txt"),
            "Research {company_nmae}: {job_description}",
        )
        .unwrap();
        let err = PromptLibrary::load(Some(dir.path()), &HumanizationSettings::default()).unwrap_err();
        assert!(matches!(err, PromptError::UnknownPlaceholder { ref placeholder, .. } if placeholder == "company_nmae"));
    }

    #[test]
    fn test_override_missing_placeholder_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("analyze_job_resonance.txt"), "Analyse {job_description}").unwrap();
        let err = PromptLibrary::load(Some(dir.path()), &HumanizationSettings::default()).unwrap_err();
        assert!(matches!(err, PromptError::MissingPlaceholder { placeholder: "company_name", .. }));
    }

    #[test]
    fn test_valid_override_is_used() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("analyze_job_resonance.txt"),
            "CUSTOM {company_name} {job_description}",
        )
        .unwrap();
        let library = PromptLibrary::load(Some(dir.path()), &HumanizationSettings::default()).unwrap();
        let job = sample_job("job-1");
        let prompt = library.render(&ResonancePrompt { job: &job }).unwrap();
        assert!(prompt.starts_with("CUSTOM "));
    }

    #[test]
    fn test_humanization_applies_only_to_targets() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("humanization_medium.txt"), "WRITE LIKE A HUMAN").unwrap();
        let settings = HumanizationSettings {
            enabled: true,
            level: "extreme".to_string(),
            apply_to: vec![HumanizationTarget::Resume],
        };
        let library = PromptLibrary::load(Some(dir.path()), &settings).unwrap();
        let job = sample_job("job-1");
        let profile = sample_profile();
        let analysis = resonance();

        let resume = library
            .render(&ResumePrompt {
                job: &job,
                profile: &profile,
                resonance: &analysis,
            })
            .unwrap();
        assert!(resume.contains(&format!("{SEPARATOR}\nWRITE LIKE A HUMAN")));

        let research = library.render(&CompanyResearchPrompt { job: &job }).unwrap();
        assert!(!research.contains("WRITE LIKE A HUMAN"));
    }

    #[test]
    fn test_missing_humanization_file_disables_it() {
        let dir = tempfile::tempdir().unwrap();
        let settings = HumanizationSettings {
            enabled: true,
            ..HumanizationSettings::default()
        };
        let library = PromptLibrary::load(Some(dir.path()), &settings).unwrap();
        assert!(library.humanization_for(StageId::Resume).is_none());
    }

    #[test]
    fn test_violation_feedback_lists_each_field() {
        let violations = vec![Violation {
            field: "projects.0.technologies".to_string(),
            message: "exceeds 70 characters".to_string(),
            kind: ViolationKind::TooLong,
        }];
        let feedback = violation_feedback(StageId::Resume, &violations);
        assert!(feedback.contains("The previous Resume Generation attempt had 1 validation error(s)"));
        assert!(feedback.contains("  • projects.0.technologies: exceeds 70 characters"));
    }
}
