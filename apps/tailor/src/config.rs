use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::generation::runner::StageId;

const DEFAULT_GENERATION_API_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

/// Process configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub generation_api_key: String,
    pub generation_api_url: String,
    pub pipeline_config: PathBuf,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            generation_api_key: require_env("GENERATION_API_KEY")?,
            generation_api_url: std::env::var("GENERATION_API_URL")
                .unwrap_or_else(|_| DEFAULT_GENERATION_API_URL.to_string()),
            pipeline_config: std::env::var("PIPELINE_CONFIG")
                .unwrap_or_else(|_| "config.json".to_string())
                .into(),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline settings file
// ────────────────────────────────────────────────────────────────────────────

/// Model and request parameters for one generation stage.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StageSettings {
    pub model: Option<String>,
    pub parameters: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StagesSettings {
    pub job_resonance: StageSettings,
    pub company_research: StageSettings,
    pub storytelling_arc: StageSettings,
    pub resume: StageSettings,
    pub cover_letter: StageSettings,
}

/// Model id and parameters after falling back to `default_model`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStage {
    pub model: String,
    pub parameters: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HumanizationTarget {
    Resume,
    CoverLetter,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HumanizationSettings {
    pub enabled: bool,
    /// `low`, `medium` or `high`. Anything else falls back to `medium`.
    pub level: String,
    pub apply_to: Vec<HumanizationTarget>,
}

impl Default for HumanizationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "medium".to_string(),
            apply_to: vec![HumanizationTarget::Resume, HumanizationTarget::CoverLetter],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub applications: PathBuf,
    pub master_profile: PathBuf,
    pub referral_contact: PathBuf,
    pub output_dir: PathBuf,
    pub incident_log: PathBuf,
    /// Optional directory of prompt overrides and humanization texts.
    pub prompts_dir: Option<PathBuf>,
    /// Optional directory of `.cls`/`.sty` files copied next to each markup file.
    pub latex_assets_dir: Option<PathBuf>,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            applications: "data/applications.json".into(),
            master_profile: "profile/master_resume.json".into(),
            referral_contact: "profile/referral_contact.json".into(),
            output_dir: "output".into(),
            incident_log: "learnings.jsonl".into(),
            prompts_dir: None,
            latex_assets_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LatexSettings {
    pub program: String,
}

impl Default for LatexSettings {
    fn default() -> Self {
        Self {
            program: "pdflatex".to_string(),
        }
    }
}

/// Pipeline behaviour, loaded from the JSON file named by `PIPELINE_CONFIG`.
/// Every field has a default, so `{}` is a valid settings file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub default_model: String,
    pub stages: StagesSettings,
    pub max_concurrent_jobs: usize,
    pub max_stage_attempts: u32,
    /// Transport-level attempts per generation call, inside each stage attempt.
    pub transport_attempts: u32,
    pub generation_timeout_secs: u64,
    pub compile_timeout_secs: u64,
    /// Overall per-job deadline. Unset means no cap beyond per-call timeouts.
    pub job_timeout_secs: Option<u64>,
    pub cover_letter_min_chars: usize,
    /// Keep model reasoning traces in responses. Off by default.
    pub reasoning_trace: bool,
    pub humanization: HumanizationSettings,
    pub paths: PathSettings,
    pub latex: LatexSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_string(),
            stages: StagesSettings::default(),
            max_concurrent_jobs: 10,
            max_stage_attempts: 2,
            transport_attempts: 2,
            generation_timeout_secs: 600,
            compile_timeout_secs: 120,
            job_timeout_secs: None,
            cover_letter_min_chars: 200,
            reasoning_trace: false,
            humanization: HumanizationSettings::default(),
            paths: PathSettings::default(),
            latex: LatexSettings::default(),
        }
    }
}

impl PipelineSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline config {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("Invalid pipeline config {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let settings: PipelineSettings = serde_json::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.max_concurrent_jobs == 0 {
            bail!("max_concurrent_jobs must be at least 1");
        }
        if self.max_stage_attempts == 0 {
            bail!("max_stage_attempts must be at least 1");
        }
        if self.transport_attempts == 0 {
            bail!("transport_attempts must be at least 1");
        }
        if self.compile_timeout_secs == 0 {
            bail!("compile_timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// Model and parameters for a stage, falling back to `default_model`.
    pub fn stage(&self, id: StageId) -> ResolvedStage {
        let s = match id {
            StageId::JobResonance => &self.stages.job_resonance,
            StageId::CompanyResearch => &self.stages.company_research,
            StageId::StorytellingArc => &self.stages.storytelling_arc,
            StageId::Resume => &self.stages.resume,
            StageId::CoverLetter => &self.stages.cover_letter,
        };
        ResolvedStage {
            model: s.model.clone().unwrap_or_else(|| self.default_model.clone()),
            parameters: s.parameters.clone(),
        }
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_secs(self.compile_timeout_secs)
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_secs.map(Duration::from_secs)
    }
}
