use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::model::{EntityType, Record, ValidationResult};
use crate::rules::{rules_for, FieldCheck};

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static email pattern"))
}

fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+\d{1,15}$").expect("static phone pattern"))
}

/// Trimmed string content, or `None` for absent / null / blank.
/// Non-string scalars are stringified so a numeric roll number still counts.
fn present(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    if text.is_empty() { None } else { Some(text) }
}

/// Whether `raw` is `+` followed by 1-15 digits once whitespace is removed.
pub fn is_valid_phone(raw: &str) -> bool {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    phone_re().is_match(&compact)
}

pub fn is_valid_email(raw: &str) -> bool {
    email_re().is_match(raw.trim())
}

/// Check a record against its type's rules. Every issue is collected.
pub fn validate(entity_type: EntityType, record: &Record) -> ValidationResult {
    let mut issues = Vec::new();

    for rule in rules_for(entity_type).checks {
        let value = present(record.get(rule.field));
        match (rule.check, value) {
            (FieldCheck::Required | FieldCheck::Email, None) => {
                issues.push(format!("{} is required", rule.label));
            }
            (FieldCheck::Email, Some(email)) if !is_valid_email(&email) => {
                issues.push("Invalid email format".to_string());
            }
            (FieldCheck::Phone, Some(phone)) if !is_valid_phone(&phone) => {
                issues.push(format!("Invalid {} format", rule.label));
            }
            _ => {}
        }
    }

    ValidationResult::from_issues(issues)
}
