//! Pure formatting helpers used by the document templates.

use std::cmp::Ordering;

use chrono::NaiveDate;

const PRESENT_MARKERS: [&str; 3] = ["present", "current", "now"];

fn is_present(value: &str) -> bool {
    let lower = value.trim().to_ascii_lowercase();
    PRESENT_MARKERS.contains(&lower.as_str())
}

/// Escapes LaTeX-reserved characters in one pass, so replacement text
/// (which itself contains `\`, `{` and `}`) is never escaped again.
pub fn latex_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for c in text.chars() {
        match c {
            '\\' => out.push_str(r"\textbackslash{}"),
            '&' => out.push_str(r"\&"),
            '%' => out.push_str(r"\%"),
            '$' => out.push_str(r"\$"),
            '#' => out.push_str(r"\#"),
            '_' => out.push_str(r"\_"),
            '{' => out.push_str(r"\{"),
            '}' => out.push_str(r"\}"),
            '~' => out.push_str(r"\textasciitilde{}"),
            '^' => out.push_str(r"\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}

fn parse_year_month(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", value.trim()), "%Y-%m-%d").ok()
}

/// `2023-06` → `Jun 2023`; present markers → `Present`; anything else unchanged.
pub fn format_date(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    if is_present(value) {
        return "Present".to_string();
    }
    match parse_year_month(value) {
        Some(date) => date.format("%b %Y").to_string(),
        None => value.to_string(),
    }
}

/// `(XXX) XXX-XXXX` for 10-digit numbers (11 with a leading `1`);
/// any other input is returned unchanged.
pub fn format_phone(value: &str) -> String {
    crate::schema::normalize_phone(value).unwrap_or_else(|_| value.to_string())
}

/// Sort key for graduation dates. Present markers and unparseable dates
/// rank as the latest possible value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GraduationKey {
    Dated(NaiveDate),
    Latest,
}

pub fn graduation_key(value: &str) -> GraduationKey {
    if is_present(value) {
        return GraduationKey::Latest;
    }
    parse_year_month(value).map_or(GraduationKey::Latest, GraduationKey::Dated)
}

/// Descending order of work start dates; present markers rank above every date.
pub fn compare_start_dates_desc(a: &str, b: &str) -> Ordering {
    fn key(value: &str) -> &str {
        if is_present(value) {
            "9999-99"
        } else {
            value
        }
    }
    key(b).cmp(key(a))
}
