use serde_json::Value;

use crate::model::{EntityType, NormalizedFields, Record};
use crate::rules::rules_for;

/// Canonical form of one value: strings are trimmed, anything else is kept.
pub fn canonical(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other.clone(),
    }
}

/// Full normalized field set for a record: trimmed fields plus pass-through
/// fields, restricted to the ones the record actually carries.
pub fn normalize(entity_type: EntityType, record: &Record) -> NormalizedFields {
    let rules = rules_for(entity_type);
    let mut out = NormalizedFields::new();

    for field in rules.trimmed {
        if let Some(value) = record.get(field) {
            out.insert((*field).to_string(), canonical(value));
        }
    }
    for field in rules.passthrough {
        if let Some(value) = record.get(field) {
            out.insert((*field).to_string(), value.clone());
        }
    }

    out
}
