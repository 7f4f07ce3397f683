//! Referral variant: the same documents with the referral phone and email.
//!
//! The contact record is loaded once per run. Any problem with it disables
//! the branch with a warning; it never fails a job.

use std::path::Path;

use serde_json::Value;
use tracing::{info, warn};

use crate::models::profile::ReferralContact;
use crate::models::resume::{ContactInfo, TailoredResume};
use crate::render::{render_cover_letter, render_resume};

const MIN_PHONE_CHARS: usize = 7;

/// Reads and checks the referral contact file. `None` disables the branch.
pub fn load_referral_contact(path: &Path) -> Option<ReferralContact> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(
                "Referral contact file {} not found; referral documents will be skipped",
                path.display()
            );
            return None;
        }
        Err(e) => {
            warn!("Could not read referral contact {}: {}; referral documents disabled", path.display(), e);
            return None;
        }
    };
    match parse_referral_contact(&raw) {
        Ok(contact) => {
            info!("Referral contact loaded; referral documents will be generated");
            Some(contact)
        }
        Err(reason) => {
            warn!("Referral contact {} rejected: {}; referral documents disabled", path.display(), reason);
            None
        }
    }
}

fn parse_referral_contact(raw: &str) -> Result<ReferralContact, String> {
    let value: Value = serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))?;
    let email = value.get("email").and_then(Value::as_str).unwrap_or_default();
    let phone = value.get("phone").and_then(Value::as_str).unwrap_or_default();
    if email.is_empty() || phone.is_empty() {
        return Err("missing required fields (email, phone)".to_string());
    }
    if !email.contains('@') {
        return Err(format!("invalid email {email:?}"));
    }
    if phone.trim().chars().count() < MIN_PHONE_CHARS {
        return Err(format!("invalid phone {phone:?}"));
    }
    Ok(ReferralContact {
        email: email.to_string(),
        phone: phone.to_string(),
    })
}

/// Markup for the referral pair.
pub struct ReferralDocuments {
    pub resume: String,
    pub cover_letter: String,
}

pub struct ReferralVariantBuilder {
    contact: Option<ReferralContact>,
}

impl ReferralVariantBuilder {
    pub fn new(contact: Option<ReferralContact>) -> Self {
        Self { contact }
    }

    pub fn from_file(path: &Path) -> Self {
        Self::new(load_referral_contact(path))
    }

    /// Renders both documents with the name kept and phone/email swapped.
    pub fn render(&self, resume: &TailoredResume, cover_letter: &str) -> Option<ReferralDocuments> {
        let referral = self.contact.as_ref()?;
        let contact = ContactInfo {
            phone: referral.phone.clone(),
            email: referral.email.clone(),
            ..resume.contact_info.clone()
        };
        let resume = TailoredResume {
            contact_info: contact.clone(),
            ..resume.clone()
        };
        Some(ReferralDocuments {
            resume: render_resume(&resume),
            cover_letter: render_cover_letter(&contact, cover_letter),
        })
    }
}
