use serde::{Deserialize, Serialize};

/// Emotional, cultural and technical signals extracted from a job posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResonanceAnalysis {
    pub emotional_keywords: Vec<String>,
    pub cultural_values: Vec<String>,
    pub hidden_requirements: Vec<String>,
    pub power_verbs: Vec<String>,
    pub technical_keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyResearch {
    pub company_name: String,
    pub mission_statement: String,
    pub core_values: Vec<String>,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub culture_keywords: Vec<String>,
    #[serde(default)]
    pub recent_news: String,
    pub mission_keywords: Vec<String>,
    pub domain_context: String,
}

/// Narrative structure for the cover letter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorytellingArc {
    pub hook: String,
    pub bridge: String,
    pub proof_points: Vec<String>,
    pub vision: String,
    pub call_to_action: String,
}
