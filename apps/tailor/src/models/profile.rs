use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The candidate's full structured background (education, work history,
/// projects, skills). Loaded once per batch and shared read-only.
///
/// The pipeline never inspects individual fields: the profile is handed to the
/// resume prompt verbatim and the model selects from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MasterProfile(Value);

impl MasterProfile {
    /// Wraps a JSON document. Returns `None` unless it is a JSON object.
    pub fn from_value(value: Value) -> Option<Self> {
        value.is_object().then_some(MasterProfile(value))
    }
}

/// Alternate phone/email used for the referral variant of the documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralContact {
    pub email: String,
    pub phone: String,
}
