//! Schema and quality rules for the three intelligence artifacts.
//!
//! Schema rules reject structurally broken output (empty required lists,
//! wrong proof-point count). Quality rules are the stricter minimums a
//! well-formed artifact must also meet before later stages may consume it.

use serde_json::Value;

use crate::models::intelligence::{CompanyResearch, ResonanceAnalysis, StorytellingArc};
use crate::schema::{parse_shape, SchemaResult, Violations};

const MIN_EMOTIONAL_KEYWORDS: usize = 3;
const MAX_EMOTIONAL_KEYWORDS: usize = 15;
const MIN_CULTURAL_VALUES: usize = 2;
const MIN_HIDDEN_REQUIREMENTS: usize = 2;
const MIN_POWER_VERBS: usize = 3;
const MIN_TECHNICAL_KEYWORDS: usize = 3;

const MIN_MISSION_CHARS: usize = 20;
const MIN_CORE_VALUES: usize = 2;
const MAX_CORE_VALUES: usize = 10;

const MIN_HOOK_CHARS: usize = 50;
const MIN_BRIDGE_CHARS: usize = 50;
const MIN_VISION_CHARS: usize = 50;
const MIN_CALL_TO_ACTION_CHARS: usize = 20;
const MIN_PROOF_POINT_CHARS: usize = 30;
const MIN_PROOF_POINTS: usize = 2;
const MAX_PROOF_POINTS: usize = 3;

// ────────────────────────────────────────────────────────────────────────────
// Resonance analysis
// ────────────────────────────────────────────────────────────────────────────

pub fn validate_resonance(value: Value) -> SchemaResult<ResonanceAnalysis> {
    let raw: ResonanceAnalysis = parse_shape(value)?;
    let mut v = Violations::default();
    for (field, list) in resonance_lists(&raw) {
        v.check_count(field, list.len(), 1, usize::MAX);
    }
    v.finish(raw)
}

pub fn check_resonance_quality(analysis: &ResonanceAnalysis) -> Result<(), String> {
    let minimums = [
        MIN_EMOTIONAL_KEYWORDS,
        MIN_CULTURAL_VALUES,
        MIN_HIDDEN_REQUIREMENTS,
        MIN_POWER_VERBS,
        MIN_TECHNICAL_KEYWORDS,
    ];
    let lists = resonance_lists(analysis);
    for ((field, list), min) in lists.iter().zip(minimums) {
        if list.len() < min {
            return Err(format!(
                "{field} must have at least {min} items, got {}",
                list.len()
            ));
        }
    }
    if analysis.emotional_keywords.len() > MAX_EMOTIONAL_KEYWORDS {
        return Err(format!(
            "emotional_keywords has too many items (max {MAX_EMOTIONAL_KEYWORDS}), got {}",
            analysis.emotional_keywords.len()
        ));
    }
    for (field, list) in lists {
        reject_blank_items(field, list)?;
    }
    Ok(())
}

fn resonance_lists(a: &ResonanceAnalysis) -> [(&'static str, &[String]); 5] {
    [
        ("emotional_keywords", a.emotional_keywords.as_slice()),
        ("cultural_values", a.cultural_values.as_slice()),
        ("hidden_requirements", a.hidden_requirements.as_slice()),
        ("power_verbs", a.power_verbs.as_slice()),
        ("technical_keywords", a.technical_keywords.as_slice()),
    ]
}

// ────────────────────────────────────────────────────────────────────────────
// Company research
// ────────────────────────────────────────────────────────────────────────────

pub fn validate_company_research(value: Value) -> SchemaResult<CompanyResearch> {
    let raw: CompanyResearch = parse_shape(value)?;
    let mut v = Violations::default();
    v.check_count("core_values", raw.core_values.len(), 1, usize::MAX);
    v.finish(raw)
}

pub fn check_company_research_quality(research: &CompanyResearch) -> Result<(), String> {
    let mission = research.mission_statement.trim().chars().count();
    if mission < MIN_MISSION_CHARS {
        return Err(format!(
            "mission_statement too short (min {MIN_MISSION_CHARS} chars), got {mission} chars"
        ));
    }
    let values = research.core_values.len();
    if values < MIN_CORE_VALUES {
        return Err(format!(
            "core_values must have at least {MIN_CORE_VALUES} items, got {values}"
        ));
    }
    if values > MAX_CORE_VALUES {
        return Err(format!(
            "core_values has too many items (max {MAX_CORE_VALUES}), got {values}"
        ));
    }
    reject_blank_items("core_values", &research.core_values)?;
    reject_blank_items("tech_stack", &research.tech_stack)?;
    reject_blank_items("culture_keywords", &research.culture_keywords)?;
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Storytelling arc
// ────────────────────────────────────────────────────────────────────────────

pub fn validate_storytelling_arc(value: Value) -> SchemaResult<StorytellingArc> {
    let raw: StorytellingArc = parse_shape(value)?;
    let mut v = Violations::default();
    v.check_non_empty("hook", &raw.hook);
    v.check_non_empty("bridge", &raw.bridge);
    v.check_non_empty("vision", &raw.vision);
    v.check_non_empty("call_to_action", &raw.call_to_action);
    v.check_count(
        "proof_points",
        raw.proof_points.len(),
        MIN_PROOF_POINTS,
        MAX_PROOF_POINTS,
    );
    v.finish(StorytellingArc {
        hook: raw.hook.trim().to_string(),
        bridge: raw.bridge.trim().to_string(),
        proof_points: raw.proof_points,
        vision: raw.vision.trim().to_string(),
        call_to_action: raw.call_to_action.trim().to_string(),
    })
}

pub fn check_storytelling_arc_quality(arc: &StorytellingArc) -> Result<(), String> {
    for (field, text, min) in [
        ("hook", &arc.hook, MIN_HOOK_CHARS),
        ("bridge", &arc.bridge, MIN_BRIDGE_CHARS),
        ("vision", &arc.vision, MIN_VISION_CHARS),
        ("call_to_action", &arc.call_to_action, MIN_CALL_TO_ACTION_CHARS),
    ] {
        let len = text.trim().chars().count();
        if len < min {
            return Err(format!(
                "{field} too short (min {min} chars), got {len} chars"
            ));
        }
    }
    for (i, point) in arc.proof_points.iter().enumerate() {
        let len = point.trim().chars().count();
        if len < MIN_PROOF_POINT_CHARS {
            return Err(format!(
                "proof_points[{i}] too short (min {MIN_PROOF_POINT_CHARS} chars), got {len} chars"
            ));
        }
    }
    Ok(())
}

fn reject_blank_items(field: &str, items: &[String]) -> Result<(), String> {
    if items.iter().any(|s| s.trim().is_empty()) {
        return Err(format!("{field} contains empty strings"));
    }
    Ok(())
}
