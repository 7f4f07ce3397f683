//! DocumentRenderer: validated data → LaTeX source.
//!
//! Rendering is pure and deterministic. Every free-text value is escaped
//! exactly once, at the point it is written into the document.

pub mod filters;

use std::fmt::Write;

use crate::models::resume::{ContactInfo, Education, TailoredResume, WorkExperience};
use filters::{compare_start_dates_desc, format_date, format_phone, graduation_key, latex_escape};

const PREAMBLE: &str = r"\documentclass[letterpaper,11pt]{article}
\usepackage[margin=0.5in]{geometry}
\usepackage[hidelinks]{hyperref}
\usepackage{enumitem}
\usepackage{titlesec}
\pagestyle{empty}
\setlength{\parindent}{0pt}
\titleformat{\section}{\large\bfseries}{}{0em}{}[\titlerule]
\titlespacing*{\section}{0pt}{8pt}{4pt}
\setlist[itemize]{leftmargin=1.2em, itemsep=0pt, topsep=2pt}
";

/// Education sorted by graduation date, most recent first.
pub fn sorted_education(education: &[Education]) -> Vec<&Education> {
    let mut sorted: Vec<&Education> = education.iter().collect();
    sorted.sort_by(|a, b| graduation_key(&b.graduation_date).cmp(&graduation_key(&a.graduation_date)));
    sorted
}

/// Work experience sorted by start date, most recent first.
pub fn sorted_work(work: &[WorkExperience]) -> Vec<&WorkExperience> {
    let mut sorted: Vec<&WorkExperience> = work.iter().collect();
    sorted.sort_by(|a, b| compare_start_dates_desc(&a.start_date, &b.start_date));
    sorted
}

fn contact_header(out: &mut String, contact: &ContactInfo) {
    let name = format!("{} {}", contact.first_name, contact.last_name);
    let mut parts = Vec::new();
    if !contact.phone.is_empty() {
        parts.push(latex_escape(&format_phone(&contact.phone)));
    }
    if !contact.email.is_empty() {
        let email = latex_escape(&contact.email);
        parts.push(format!(r"\href{{mailto:{email}}}{{{email}}}"));
    }
    if !contact.location.is_empty() {
        parts.push(latex_escape(&contact.location));
    }
    for url in [&contact.linkedin_url, &contact.github_url, &contact.portfolio_url] {
        if !url.is_empty() {
            let url = latex_escape(url);
            parts.push(format!(r"\href{{{url}}}{{{url}}}"));
        }
    }

    out.push_str("\\begin{center}\n");
    let _ = writeln!(out, r"{{\Huge \textbf{{{}}}}} \\[4pt]", latex_escape(&name));
    let _ = writeln!(out, "{}", parts.join(r" $|$ "));
    out.push_str("\\end{center}\n");
}

fn bullet_list(out: &mut String, bullets: &[String]) {
    out.push_str("\\begin{itemize}\n");
    for bullet in bullets {
        let _ = writeln!(out, r"  \item {}", latex_escape(bullet));
    }
    out.push_str("\\end{itemize}\n");
}

fn date_range(start: &str, end: &str) -> String {
    latex_escape(&format!("{} -- {}", format_date(start), format_date(end)))
}

pub fn render_resume(resume: &TailoredResume) -> String {
    let mut out = String::from(PREAMBLE);
    out.push_str("\\begin{document}\n\n");
    contact_header(&mut out, &resume.contact_info);

    out.push_str("\n\\section{Education}\n");
    for edu in sorted_education(&resume.education) {
        let _ = writeln!(
            out,
            r"\textbf{{{}}} \hfill {} \\",
            latex_escape(&edu.institution),
            date_range(&edu.start_date, &edu.graduation_date)
        );
        let degree = if edu.gpa.trim().is_empty() {
            latex_escape(&edu.degree)
        } else {
            format!("{} (GPA: {})", latex_escape(&edu.degree), latex_escape(&edu.gpa))
        };
        let _ = writeln!(out, r"\textit{{{degree}}} \\[4pt]");
    }

    out.push_str("\n\\section{Skills}\n");
    for (category, skills) in &resume.skills {
        let _ = writeln!(
            out,
            r"\textbf{{{}:}} {} \\",
            latex_escape(category),
            latex_escape(skills)
        );
    }

    out.push_str("\n\\section{Experience}\n");
    for work in sorted_work(&resume.work_experience) {
        let _ = writeln!(
            out,
            r"\textbf{{{}}} \hfill {} \\",
            latex_escape(&work.job_title),
            date_range(&work.start_date, &work.end_date)
        );
        let location = work
            .location
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .map(|l| format!(r" \hfill {}", latex_escape(l)))
            .unwrap_or_default();
        let _ = writeln!(out, r"\textit{{{}}}{location}", latex_escape(&work.company));
        bullet_list(&mut out, &work.bullet_points);
    }

    out.push_str("\n\\section{Projects}\n");
    for project in &resume.projects {
        let mut heading = format!(r"\textbf{{{}}}", latex_escape(&project.project_name));
        if !project.technologies.is_empty() {
            let _ = write!(
                heading,
                r" $|$ \textit{{{}}}",
                latex_escape(&project.technologies.join(", "))
            );
        }
        if !project.project_url.trim().is_empty() {
            let url = latex_escape(&project.project_url);
            let _ = write!(heading, r" \hfill \href{{{url}}}{{{url}}}");
        }
        let _ = writeln!(out, "{heading}");
        bullet_list(&mut out, &project.bullet_points);
    }

    out.push_str("\n\\end{document}\n");
    out
}

/// Cover letter with the contact header. Paragraphs are separated by blank
/// lines in `body`.
pub fn render_cover_letter(contact: &ContactInfo, body: &str) -> String {
    let mut out = String::from(PREAMBLE);
    out.push_str("\\begin{document}\n\n");
    contact_header(&mut out, contact);
    out.push_str("\n\\vspace{12pt}\n");

    let paragraphs = body
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| latex_escape(&p.lines().map(str::trim).collect::<Vec<_>>().join(" ")));
    for paragraph in paragraphs {
        let _ = writeln!(out, "{paragraph}\n");
    }

    let _ = writeln!(
        out,
        r"Sincerely, \\[4pt]{}",
        latex_escape(&format!("{} {}", contact.first_name, contact.last_name))
    );
    out.push_str("\n\\end{document}\n");
    out
}
