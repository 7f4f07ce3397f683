//! TailoredResume rules.
//!
//! - contact fields sanitized, phone normalized to `(XXX) XXX-XXXX`
//! - `professional_summaries` must be empty
//! - education: at least 1 entry
//! - skills: category ≤ 30 chars, skills string ≤ 90 chars
//! - work experience: exactly 3 entries × exactly 4 bullets ≤ 118 chars
//! - projects: exactly 3 entries × exactly 4 bullets ≤ 118 chars,
//!   technologies joined with ", " ≤ 70 chars

use std::collections::BTreeMap;

use serde_json::Value;

use crate::models::resume::{ContactInfo, Education, Project, TailoredResume, WorkExperience};
use crate::schema::{
    normalize_phone, parse_shape, sanitize_ats, SchemaResult, ViolationKind, Violations,
};

pub const WORK_EXPERIENCE_COUNT: usize = 3;
pub const PROJECT_COUNT: usize = 3;
pub const BULLETS_PER_ENTRY: usize = 4;
pub const MAX_BULLET_CHARS: usize = 118;
pub const MAX_TECHNOLOGIES_CHARS: usize = 70;
pub const MAX_SKILL_CATEGORY_CHARS: usize = 30;
pub const MAX_SKILLS_CHARS: usize = 90;

/// Validates and sanitizes a candidate resume. Any violation rejects the whole value.
pub fn validate_tailored_resume(value: Value) -> SchemaResult<TailoredResume> {
    let raw: TailoredResume = parse_shape(value)?;
    let mut v = Violations::default();

    let contact_info = validate_contact(raw.contact_info, &mut v);

    if !raw.professional_summaries.trim().is_empty() {
        v.push(
            "professional_summaries",
            ViolationKind::NotEmpty,
            "must be an empty string to maximize content space",
        );
    }

    v.check_count("education", raw.education.len(), 1, usize::MAX);
    let education = raw
        .education
        .into_iter()
        .enumerate()
        .map(|(i, e)| validate_education(i, e, &mut v))
        .collect();

    let skills = validate_skills(raw.skills, &mut v);

    v.check_count(
        "work_experience",
        raw.work_experience.len(),
        WORK_EXPERIENCE_COUNT,
        WORK_EXPERIENCE_COUNT,
    );
    let work_experience = raw
        .work_experience
        .into_iter()
        .enumerate()
        .map(|(i, w)| validate_work_experience(i, w, &mut v))
        .collect();

    v.check_count("projects", raw.projects.len(), PROJECT_COUNT, PROJECT_COUNT);
    let projects = raw
        .projects
        .into_iter()
        .enumerate()
        .map(|(i, p)| validate_project(i, p, &mut v))
        .collect();

    v.finish(TailoredResume {
        contact_info,
        professional_summaries: String::new(),
        education,
        skills,
        work_experience,
        projects,
    })
}

fn validate_contact(c: ContactInfo, v: &mut Violations) -> ContactInfo {
    let phone = match normalize_phone(&c.phone) {
        Ok(p) => p,
        Err(found) => {
            v.push(
                "contact_info.phone",
                ViolationKind::Format,
                format!(
                    "Phone number must be 10 digits (found {found}). \
                     Format should be: (XXX) XXX-XXXX or XXX-XXX-XXXX"
                ),
            );
            c.phone
        }
    };

    ContactInfo {
        first_name: sanitize_ats(&c.first_name),
        last_name: sanitize_ats(&c.last_name),
        phone,
        email: sanitize_ats(&c.email),
        location: sanitize_ats(&c.location),
        linkedin_url: sanitize_ats(&c.linkedin_url),
        github_url: sanitize_ats(&c.github_url),
        portfolio_url: sanitize_ats(&c.portfolio_url),
    }
}

fn validate_education(i: usize, e: Education, v: &mut Violations) -> Education {
    let institution = sanitize_ats(&e.institution);
    let degree = sanitize_ats(&e.degree);
    v.check_non_empty(&format!("education.{i}.institution"), &institution);
    v.check_non_empty(&format!("education.{i}.degree"), &degree);
    v.check_non_empty(&format!("education.{i}.graduation_date"), &e.graduation_date);
    Education {
        institution,
        degree,
        start_date: e.start_date.trim().to_string(),
        graduation_date: e.graduation_date.trim().to_string(),
        gpa: e.gpa,
    }
}

fn validate_skills(skills: BTreeMap<String, String>, v: &mut Violations) -> BTreeMap<String, String> {
    let mut clean = BTreeMap::new();
    for (category, value) in skills {
        let category = sanitize_ats(&category);
        let value = sanitize_ats(&value);
        v.check_max_chars(
            &format!("skills.{category}"),
            &category,
            MAX_SKILL_CATEGORY_CHARS,
        );
        v.check_max_chars(&format!("skills.{category}.value"), &value, MAX_SKILLS_CHARS);
        if clean.contains_key(&category) {
            v.push(
                format!("skills.{category}"),
                ViolationKind::InvalidShape,
                format!("duplicate skill category '{category}' after removing unsafe characters"),
            );
            continue;
        }
        clean.insert(category, value);
    }
    clean
}

fn validate_work_experience(i: usize, w: WorkExperience, v: &mut Violations) -> WorkExperience {
    let path = format!("work_experience.{i}");
    let bullet_points = validate_bullets(&path, w.bullet_points, v);
    WorkExperience {
        job_title: sanitize_ats(&w.job_title),
        company: sanitize_ats(&w.company),
        start_date: w.start_date.trim().to_string(),
        end_date: w.end_date.trim().to_string(),
        location: w.location.map(|l| sanitize_ats(&l)),
        bullet_points,
    }
}

fn validate_project(i: usize, p: Project, v: &mut Violations) -> Project {
    let path = format!("projects.{i}");
    let bullet_points = validate_bullets(&path, p.bullet_points, v);

    let technologies: Vec<String> = p.technologies.iter().map(|t| sanitize_ats(t)).collect();
    let joined = technologies.join(", ");
    v.check_max_chars(
        &format!("{path}.technologies"),
        &joined,
        MAX_TECHNOLOGIES_CHARS,
    );

    Project {
        project_name: sanitize_ats(&p.project_name),
        technologies,
        project_url: p.project_url.trim().to_string(),
        description: p.description,
        bullet_points,
    }
}

fn validate_bullets(parent: &str, bullets: Vec<String>, v: &mut Violations) -> Vec<String> {
    let field = format!("{parent}.bullet_points");
    v.check_count(&field, bullets.len(), BULLETS_PER_ENTRY, BULLETS_PER_ENTRY);
    bullets
        .iter()
        .enumerate()
        .map(|(j, b)| {
            let clean = sanitize_ats(b);
            v.check_max_chars(&format!("{field}.{j}"), &clean, MAX_BULLET_CHARS);
            clean
        })
        .collect()
}

/// Semantic checks that a schema-valid resume must also pass: nothing the
/// renderer needs may have been sanitized away to an empty string.
pub fn check_resume_quality(resume: &TailoredResume) -> Result<(), String> {
    let contact = &resume.contact_info;
    if contact.first_name.is_empty() || contact.last_name.is_empty() {
        return Err("contact_info first_name and last_name must be non-empty".to_string());
    }
    if !contact.email.contains('@') {
        return Err(format!(
            "contact_info.email must be an email address, got '{}'",
            contact.email
        ));
    }
    for (i, w) in resume.work_experience.iter().enumerate() {
        if w.job_title.is_empty() || w.company.is_empty() {
            return Err(format!(
                "work_experience[{i}] job_title and company must be non-empty"
            ));
        }
        if let Some(j) = w.bullet_points.iter().position(String::is_empty) {
            return Err(format!(
                "work_experience[{i}].bullet_points[{j}] is empty after sanitization"
            ));
        }
    }
    for (i, p) in resume.projects.iter().enumerate() {
        if p.project_name.is_empty() {
            return Err(format!("projects[{i}].project_name must be non-empty"));
        }
        if let Some(j) = p.bullet_points.iter().position(String::is_empty) {
            return Err(format!(
                "projects[{i}].bullet_points[{j}] is empty after sanitization"
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ATS_UNSAFE_CHARS;
    use crate::test_support::valid_resume_json;
    use serde_json::json;

    #[test]
    fn test_valid_resume_passes() {
        let resume = validate_tailored_resume(valid_resume_json()).unwrap();
        assert_eq!(resume.work_experience.len(), 3);
        assert_eq!(resume.projects.len(), 3);
        assert_eq!(resume.contact_info.phone, "(919) 672-2226");
        assert!(check_resume_quality(&resume).is_ok());
    }

    #[test]
    fn test_two_or_four_work_entries_rejected() {
        let mut two = valid_resume_json();
        two["work_experience"].as_array_mut().unwrap().pop();
        let errs = validate_tailored_resume(two).unwrap_err();
        assert!(errs.iter().any(|e| e.field == "work_experience" && e.kind == ViolationKind::Count));

        let mut four = valid_resume_json();
        let extra = four["work_experience"][0].clone();
        four["work_experience"].as_array_mut().unwrap().push(extra);
        let errs = validate_tailored_resume(four).unwrap_err();
        assert!(errs.iter().any(|e| e.field == "work_experience"));
    }

    #[test]
    fn test_two_or_four_projects_rejected() {
        let mut two = valid_resume_json();
        two["projects"].as_array_mut().unwrap().pop();
        assert!(validate_tailored_resume(two).is_err());

        let mut four = valid_resume_json();
        let extra = four["projects"][1].clone();
        four["projects"].as_array_mut().unwrap().push(extra);
        assert!(validate_tailored_resume(four).is_err());
    }

    #[test]
    fn test_bullet_count_must_be_exactly_four() {
        let mut three = valid_resume_json();
        three["work_experience"][1]["bullet_points"]
            .as_array_mut()
            .unwrap()
            .pop();
        let errs = validate_tailored_resume(three).unwrap_err();
        assert_eq!(errs[0].field, "work_experience.1.bullet_points");

        let mut five = valid_resume_json();
        five["projects"][2]["bullet_points"]
            .as_array_mut()
            .unwrap()
            .push(json!("Added a fifth bullet that does not fit"));
        let errs = validate_tailored_resume(five).unwrap_err();
        assert_eq!(errs[0].field, "projects.2.bullet_points");
    }

    #[test]
    fn test_empty_education_rejected() {
        let mut resume = valid_resume_json();
        resume["education"] = json!([]);
        let errs = validate_tailored_resume(resume).unwrap_err();
        assert_eq!(errs[0].field, "education");
    }

    #[test]
    fn test_bullet_length_checked_after_sanitization() {
        // 118 visible chars plus unsafe chars that will be stripped.
        let mut resume = valid_resume_json();
        let padded = format!("<<{}>>", "a".repeat(MAX_BULLET_CHARS));
        resume["work_experience"][0]["bullet_points"][0] = json!(padded);
        let ok = validate_tailored_resume(resume).unwrap();
        let bullet = &ok.work_experience[0].bullet_points[0];
        assert_eq!(bullet.chars().count(), MAX_BULLET_CHARS);
        assert!(!bullet.chars().any(|c| ATS_UNSAFE_CHARS.contains(&c)));

        let mut resume = valid_resume_json();
        resume["projects"][0]["bullet_points"][3] = json!("b".repeat(MAX_BULLET_CHARS + 1));
        let errs = validate_tailored_resume(resume).unwrap_err();
        assert_eq!(errs[0].field, "projects.0.bullet_points.3");
        assert_eq!(errs[0].kind, ViolationKind::TooLong);
    }

    #[test]
    fn test_technologies_joined_length_limit() {
        let mut resume = valid_resume_json();
        resume["projects"][0]["technologies"] = json!(["a".repeat(40), "b".repeat(40)]);
        let errs = validate_tailored_resume(resume).unwrap_err();
        assert_eq!(errs[0].field, "projects.0.technologies");
    }

    #[test]
    fn test_skills_limits() {
        let mut resume = valid_resume_json();
        resume["skills"] = json!({
            "A category name that is far too long": "Rust",
            "Languages": "x".repeat(91),
        });
        let errs = validate_tailored_resume(resume).unwrap_err();
        assert_eq!(errs.len(), 2);
        assert!(errs.iter().all(|e| e.kind == ViolationKind::TooLong));
    }

    #[test]
    fn test_skill_categories_colliding_after_sanitization_rejected() {
        let mut resume = valid_resume_json();
        resume["skills"] = json!({
            "Tools core": "Docker, Terraform",
            "Tools {core}": "Kubernetes, Helm",
        });
        let errs = validate_tailored_resume(resume).unwrap_err();
        assert_eq!(errs.len(), 1, "got {errs:?}");
        assert_eq!(errs[0].field, "skills.Tools core");
        assert_eq!(errs[0].kind, ViolationKind::InvalidShape);
    }

    #[test]
    fn test_professional_summary_must_be_empty() {
        let mut resume = valid_resume_json();
        resume["professional_summaries"] = json!("Seasoned engineer with a passion for Rust.");
        let errs = validate_tailored_resume(resume).unwrap_err();
        assert_eq!(errs[0].kind, ViolationKind::NotEmpty);

        let mut resume = valid_resume_json();
        resume["professional_summaries"] = json!("   ");
        assert_eq!(
            validate_tailored_resume(resume).unwrap().professional_summaries,
            ""
        );
    }

    #[test]
    fn test_bad_phone_rejected() {
        let mut resume = valid_resume_json();
        resume["contact_info"]["phone"] = json!("672-2226");
        let errs = validate_tailored_resume(resume).unwrap_err();
        assert_eq!(errs[0].field, "contact_info.phone");
        assert!(errs[0].message.contains("found 7"));
    }

    #[test]
    fn test_contact_fields_sanitized() {
        let mut resume = valid_resume_json();
        resume["contact_info"]["location"] = json!("Raleigh, NC ~ {remote}");
        resume["contact_info"]["first_name"] = json!("[Jane]");
        let ok = validate_tailored_resume(resume).unwrap();
        assert_eq!(ok.contact_info.location, "Raleigh, NC  remote");
        assert_eq!(ok.contact_info.first_name, "Jane");
    }

    #[test]
    fn test_all_violations_reported_at_once() {
        let mut resume = valid_resume_json();
        resume["contact_info"]["phone"] = json!("123");
        resume["projects"].as_array_mut().unwrap().pop();
        resume["work_experience"][0]["bullet_points"][0] = json!("c".repeat(200));
        let errs = validate_tailored_resume(resume).unwrap_err();
        assert_eq!(errs.len(), 3, "got {errs:?}");
    }

    #[test]
    fn test_wrong_field_name_is_shape_violation() {
        let mut resume = valid_resume_json();
        let edu = resume["education"][0].as_object_mut().unwrap();
        let grad = edu.remove("graduation_date").unwrap();
        edu.insert("end_date".to_string(), grad);
        let errs = validate_tailored_resume(resume).unwrap_err();
        assert_eq!(errs[0].kind, ViolationKind::InvalidShape);
        assert!(errs[0].message.contains("graduation_date"));
    }

    #[test]
    fn test_quality_rejects_bullet_emptied_by_sanitization() {
        let mut resume = valid_resume_json();
        resume["work_experience"][2]["bullet_points"][1] = json!("<>[]{}");
        let ok = validate_tailored_resume(resume).unwrap();
        let err = check_resume_quality(&ok).unwrap_err();
        assert!(err.contains("work_experience[2].bullet_points[1]"));
    }
}
