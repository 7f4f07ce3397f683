//! Schema validation for generated artifacts.
//!
//! Validation is total and side-effect-free: it consumes a candidate JSON value
//! and returns either the sanitized typed value or every field-level violation
//! found. Sanitization happens inside validation so that length limits apply to
//! the sanitized text, never the raw model output.

pub mod intelligence;
pub mod resume;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Characters that break ATS parsers. Stripped from every free-text field.
pub const ATS_UNSAFE_CHARS: &[char] = &['<', '>', '[', ']', '{', '}', '\\', '|', '~', '^'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Wrong JSON type, missing required field, unknown enum value.
    InvalidShape,
    /// Too few or too many list entries.
    Count,
    TooLong,
    TooShort,
    /// Value present but not in the required format (phone numbers).
    Format,
    /// Field that must be left empty.
    NotEmpty,
}

/// A single field-level rule failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Dotted path, list indices included: `work_experience.1.bullet_points.3`.
    pub field: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: ViolationKind,
}

pub type SchemaResult<T> = Result<T, Vec<Violation>>;

/// Accumulates violations while a validator walks a value.
#[derive(Debug, Default)]
pub struct Violations(Vec<Violation>);

impl Violations {
    pub fn push(&mut self, field: impl Into<String>, kind: ViolationKind, message: impl Into<String>) {
        self.0.push(Violation {
            field: field.into(),
            message: message.into(),
            kind,
        });
    }

    /// Records a count violation unless `min <= len <= max`.
    pub fn check_count(&mut self, field: &str, len: usize, min: usize, max: usize) {
        if len < min || len > max {
            let expected = if min == max {
                format!("exactly {min}")
            } else if max == usize::MAX {
                format!("at least {min}")
            } else {
                format!("between {min} and {max}")
            };
            self.push(
                field,
                ViolationKind::Count,
                format!("expected {expected} entries, got {len}"),
            );
        }
    }

    /// Records a length violation if `text` is longer than `max` characters.
    pub fn check_max_chars(&mut self, field: &str, text: &str, max: usize) {
        let len = text.chars().count();
        if len > max {
            let preview: String = text.chars().take(50).collect();
            self.push(
                field,
                ViolationKind::TooLong,
                format!("exceeds {max} characters ({len} chars): {preview}..."),
            );
        }
    }

    /// Records a violation if `text` is empty after trimming.
    pub fn check_non_empty(&mut self, field: &str, text: &str) {
        if text.trim().is_empty() {
            self.push(field, ViolationKind::TooShort, "must be a non-empty string");
        }
    }

    /// Returns `value` if nothing was recorded. Partial acceptance is never allowed.
    pub fn finish<T>(self, value: T) -> SchemaResult<T> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(self.0)
        }
    }
}

/// Deserializes the raw shape. Type errors become a single `InvalidShape`
/// violation at the root since serde does not report a field path.
pub fn parse_shape<T: DeserializeOwned>(value: Value) -> SchemaResult<T> {
    serde_json::from_value(value).map_err(|e| {
        vec![Violation {
            field: "$".to_string(),
            message: e.to_string(),
            kind: ViolationKind::InvalidShape,
        }]
    })
}

/// Strips ATS-unsafe characters and surrounding whitespace.
pub fn sanitize_ats(text: &str) -> String {
    text.chars()
        .filter(|c| !ATS_UNSAFE_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Normalizes a phone number to `(XXX) XXX-XXXX`.
///
/// Non-digits are ignored; an 11-digit number with a leading `1` loses its
/// country code. Any other digit count is rejected with the count found.
pub fn normalize_phone(raw: &str) -> Result<String, usize> {
    let mut digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == 11 && digits.starts_with('1') {
        digits.remove(0);
    }
    if digits.len() != 10 {
        return Err(digits.len());
    }
    Ok(format!(
        "({}) {}-{}",
        &digits[..3],
        &digits[3..6],
        &digits[6..]
    ))
}

/// Concise field-by-field summary used in retry feedback and fatal errors.
pub fn describe_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.field, v.message))
        .collect::<Vec<_>>()
        .join("; ")
}
