//! Fixtures and stub collaborators shared by unit tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::compiler::{CompileError, DocumentCompiler};
use crate::config::PipelineSettings;
use crate::llm_client::{GenerationClient, GenerationError};
use crate::models::job::{Job, PendingJob};
use crate::models::profile::MasterProfile;
use crate::models::resume::TailoredResume;
use crate::pipeline::events::PipelineObserver;
use crate::pipeline::job::JobState;
use crate::schema::resume::validate_tailored_resume;

const RESONANCE_MODEL: &str = "stub-resonance";
const RESEARCH_MODEL: &str = "stub-research";
const RESUME_MODEL: &str = "stub-resume";
const ARC_MODEL: &str = "stub-arc";
const COVER_LETTER_MODEL: &str = "stub-cover-letter";

pub const VALID_COVER_LETTER: &str = "\
Dear Hiring Team,

When I read that Acme Robotics wants warehouse robots that never drop a pick, I recognised the \
problem I have spent three years on: making distributed control software boring in the best way.

At Northwind I rebuilt a telemetry pipeline in Rust that now moves two billion events a day with \
p99 latency under 40 ms, and I led the on-call rotation that took incident volume down by half.

I would love to bring that same care to your fleet platform. I am happy to walk through any of \
this in more detail whenever suits you.
";

// ────────────────────────────────────────────────────────────────────────────
// Generated artifacts
// ────────────────────────────────────────────────────────────────────────────

pub fn fenced(value: &Value) -> String {
    format!("```json\n{}\n```", serde_json::to_string_pretty(value).unwrap())
}

fn bullets(prefix: &str) -> Value {
    json!([
        format!("{prefix}: cut p99 latency from 180 ms to 40 ms by reworking the request path"),
        format!("{prefix}: led migration of six services to Kubernetes with zero downtime"),
        format!("{prefix}: built alerting that halved mean time to recovery across the team"),
        format!("{prefix}: mentored four engineers and ran the weekly design review"),
    ])
}

pub fn valid_resume_json() -> Value {
    json!({
        "contact_info": {
            "first_name": "Jane",
            "last_name": "Doe",
            "phone": "919-672-2226",
            "email": "jane.doe@example.com",
            "location": "Raleigh, NC",
            "linkedin_url": "https://linkedin.com/in/janedoe",
            "github_url": "https://github.com/janedoe",
            "portfolio_url": "https://janedoe.dev"
        },
        "professional_summaries": "",
        "education": [{
            "institution": "North Carolina State University",
            "degree": "B.S. Computer Science",
            "start_date": "2017-08",
            "graduation_date": "2021-05",
            "gpa": "3.8"
        }],
        "skills": {
            "Languages": "Rust, Go, Python, SQL",
            "Infrastructure": "Kubernetes, Terraform, AWS, PostgreSQL"
        },
        "work_experience": [
            {
                "job_title": "Senior Software Engineer",
                "company": "Northwind",
                "start_date": "2023-06",
                "end_date": "Present",
                "location": "Remote",
                "bullet_points": bullets("Northwind")
            },
            {
                "job_title": "Software Engineer",
                "company": "Globex",
                "start_date": "2021-07",
                "end_date": "2023-05",
                "bullet_points": bullets("Globex")
            },
            {
                "job_title": "Engineering Intern",
                "company": "Initech",
                "start_date": "2020-05",
                "end_date": "2020-08",
                "bullet_points": bullets("Initech")
            }
        ],
        "projects": [
            {
                "project_name": "tracewire",
                "technologies": ["Rust", "Tokio", "gRPC"],
                "project_url": "https://github.com/janedoe/tracewire",
                "bullet_points": bullets("tracewire")
            },
            {
                "project_name": "shelfscan",
                "technologies": ["Python", "OpenCV"],
                "project_url": "https://github.com/janedoe/shelfscan",
                "bullet_points": bullets("shelfscan")
            },
            {
                "project_name": "quorum",
                "technologies": ["Go", "Raft", "etcd"],
                "project_url": "https://github.com/janedoe/quorum",
                "bullet_points": bullets("quorum")
            }
        ]
    })
}

pub fn valid_resume() -> TailoredResume {
    validate_tailored_resume(valid_resume_json()).unwrap()
}

pub fn valid_resonance_json() -> Value {
    json!({
        "emotional_keywords": ["ownership", "craft", "curiosity", "impact"],
        "cultural_values": ["bias for action", "customer obsession"],
        "hidden_requirements": ["comfortable on call", "can mentor juniors"],
        "power_verbs": ["architected", "scaled", "shipped", "led"],
        "technical_keywords": ["Rust", "Kubernetes", "distributed systems"]
    })
}

pub fn valid_company_research_json() -> Value {
    json!({
        "company_name": "Acme Robotics",
        "mission_statement": "Make every warehouse pick fast, safe and reliable.",
        "core_values": ["safety first", "ship and learn", "own the outcome"],
        "tech_stack": ["Rust", "ROS 2", "Kubernetes"],
        "culture_keywords": ["hands-on", "collaborative"],
        "recent_news": "Raised a Series C to expand into European fulfilment centres.",
        "mission_keywords": ["reliability", "automation"],
        "domain_context": "Warehouse robotics and fleet orchestration software."
    })
}

pub fn valid_storytelling_arc_json() -> Value {
    json!({
        "hook": "Robots that never drop a pick need software that never surprises its operators.",
        "bridge": "I have spent three years making distributed control systems predictable under load.",
        "proof_points": [
            "Rebuilt a telemetry pipeline in Rust handling two billion events a day.",
            "Halved incident volume by leading the on-call rotation and alerting redesign."
        ],
        "vision": "Help Acme's fleet platform scale to new regions without losing its reliability.",
        "call_to_action": "I would welcome a conversation about the fleet team."
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Inputs and settings
// ────────────────────────────────────────────────────────────────────────────

const SAMPLE_DESCRIPTION: &str = "Acme Robotics is hiring a backend engineer to build the control \
plane for our warehouse robot fleet. You will own Rust services, Kubernetes deployments and the \
on-call rotation for fleet orchestration.";

pub fn pending_job(id: &str) -> PendingJob {
    PendingJob {
        job_id: Some(id.to_string()),
        job_title: Some("Senior Backend Engineer".to_string()),
        company_name: Some("Acme Robotics".to_string()),
        job_description: Some(SAMPLE_DESCRIPTION.to_string()),
        status: Some("pending".to_string()),
        extra: Map::new(),
    }
}

pub fn sample_job(id: &str) -> Job {
    Job::from_pending(&pending_job(id)).unwrap()
}

pub fn sample_profile() -> MasterProfile {
    MasterProfile::from_value(json!({
        "contact_info": {"first_name": "Jane", "last_name": "Doe", "email": "jane.doe@example.com"},
        "education": [{"institution": "North Carolina State University", "degree": "B.S. Computer Science"}],
        "work_experience": [{"company": "Northwind", "job_title": "Senior Software Engineer"}],
        "skills": {"Languages": "Rust, Go, Python"}
    }))
    .unwrap()
}

/// Settings with a distinct model per stage so stub clients can tell the
/// stages apart, and every path under `root`.
pub fn stub_settings(root: &Path) -> PipelineSettings {
    let mut settings = PipelineSettings::default();
    settings.stages.job_resonance.model = Some(RESONANCE_MODEL.to_string());
    settings.stages.company_research.model = Some(RESEARCH_MODEL.to_string());
    settings.stages.resume.model = Some(RESUME_MODEL.to_string());
    settings.stages.storytelling_arc.model = Some(ARC_MODEL.to_string());
    settings.stages.cover_letter.model = Some(COVER_LETTER_MODEL.to_string());
    settings.paths.output_dir = root.join("output");
    settings.paths.incident_log = root.join("incidents.jsonl");
    settings
}

/// Sorted `(files, directories)` directly inside `dir`.
pub fn top_level_entries(dir: &Path) -> (Vec<String>, Vec<String>) {
    let mut files = Vec::new();
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().unwrap().is_dir() {
            dirs.push(name);
        } else {
            files.push(name);
        }
    }
    files.sort();
    dirs.sort();
    (files, dirs)
}

// ────────────────────────────────────────────────────────────────────────────
// Generation clients
// ────────────────────────────────────────────────────────────────────────────

enum Script {
    Sequence(Vec<String>),
    Failing,
}

/// Replays canned responses in order, repeating the last one once exhausted.
pub struct ScriptedClient {
    script: Script,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn repeating(response: impl Into<String>) -> Self {
        Self::sequence(vec![response.into()])
    }

    pub fn sequence(responses: Vec<String>) -> Self {
        Self {
            script: Script::Sequence(responses),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            script: Script::Failing,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn generate(
        &self,
        prompt: &str,
        _model: &str,
        _parameters: &Map<String, Value>,
    ) -> Result<String, GenerationError> {
        let call = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            prompts.len() - 1
        };
        match &self.script {
            Script::Failing => Err(GenerationError::Exhausted {
                attempts: 2,
                last_error: "connection refused".to_string(),
            }),
            Script::Sequence(responses) => {
                let i = call.min(responses.len().saturating_sub(1));
                Ok(responses.get(i).cloned().unwrap_or_default())
            }
        }
    }
}

/// Answers every stage with a valid response, keyed by the stage's model.
pub struct HappyClient;

pub fn happy_client() -> HappyClient {
    HappyClient
}

#[async_trait]
impl GenerationClient for HappyClient {
    async fn generate(
        &self,
        _prompt: &str,
        model: &str,
        _parameters: &Map<String, Value>,
    ) -> Result<String, GenerationError> {
        let response = match model {
            RESONANCE_MODEL => fenced(&valid_resonance_json()),
            RESEARCH_MODEL => fenced(&valid_company_research_json()),
            RESUME_MODEL => fenced(&valid_resume_json()),
            ARC_MODEL => fenced(&valid_storytelling_arc_json()),
            COVER_LETTER_MODEL => VALID_COVER_LETTER.to_string(),
            other => {
                return Err(GenerationError::Api {
                    status: 404,
                    message: format!("unknown model {other}"),
                })
            }
        };
        Ok(response)
    }
}

/// Delays every call and records the most calls ever in flight at once.
pub struct ConcurrencyProbe {
    inner: Arc<dyn GenerationClient>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ConcurrencyProbe {
    pub fn new(inner: impl GenerationClient + 'static, delay: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl GenerationClient for ConcurrencyProbe {
    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        parameters: &Map<String, Value>,
    ) -> Result<String, GenerationError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.inner.generate(prompt, model, parameters).await
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Compiler and observer
// ────────────────────────────────────────────────────────────────────────────

/// Writes `<stem>.pdf` next to the markup, or fails for matching stems.
#[derive(Default)]
pub struct StubCompiler {
    fail_on: Option<String>,
}

impl StubCompiler {
    pub fn failing_on(stem_fragment: &str) -> Self {
        Self {
            fail_on: Some(stem_fragment.to_string()),
        }
    }
}

#[async_trait]
impl DocumentCompiler for StubCompiler {
    async fn compile(&self, markup: &Path, out_dir: &Path) -> Result<PathBuf, CompileError> {
        let stem = markup
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        if let Some(fragment) = &self.fail_on {
            if stem.contains(fragment.as_str()) {
                return Err(CompileError::Failed {
                    details: "no PDF produced".to_string(),
                });
            }
        }
        let pdf = out_dir.join(format!("{stem}.pdf"));
        tokio::fs::write(&pdf, b"%PDF-1.4\n").await?;
        Ok(pdf)
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    states: Mutex<Vec<JobState>>,
}

impl RecordingObserver {
    pub fn states(&self) -> Vec<JobState> {
        self.states.lock().unwrap().clone()
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_job_state(&self, _job_id: &str, state: JobState) {
        self.states.lock().unwrap().push(state);
    }
}
