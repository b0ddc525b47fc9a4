use crate::model::{EntityType, Record};
use crate::normalize::normalize;
use crate::rules::rules_for;

/// Names of fields whose stored value differs from the normalized one,
/// in rule order.
pub fn drifted_fields(entity_type: EntityType, record: &Record) -> Vec<String> {
    let normalized = normalize(entity_type, record);
    let rules = rules_for(entity_type);
    rules
        .trimmed
        .iter()
        .chain(rules.passthrough)
        .filter(|field| match (record.get(field), normalized.get(**field)) {
            (Some(current), Some(canonical)) => current != canonical,
            _ => false,
        })
        .map(|field| (*field).to_string())
        .collect()
}

/// Structural diff against the normalized form. Never consults the store.
pub fn needs_update(entity_type: EntityType, record: &Record) -> bool {
    !drifted_fields(entity_type, record).is_empty()
}
