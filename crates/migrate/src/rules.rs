//! Per-type rule tables that drive validation and normalization.

use crate::model::EntityType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCheck {
    /// Absent, null or blank is an issue.
    Required,
    /// Required, and must look like an email address.
    Email,
    /// Optional, but when present must be `+` followed by 1-15 digits.
    Phone,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: &'static str,
    pub label: &'static str,
    pub check: FieldCheck,
}

/// Rule set for one entity type.
#[derive(Debug)]
pub struct EntityRules {
    /// Checked in this order; issue order follows it.
    pub checks: &'static [FieldRule],
    /// Fields known to drift; canonical form is the trimmed value.
    pub trimmed: &'static [&'static str],
    /// Sent back unchanged with every update.
    pub passthrough: &'static [&'static str],
}

const fn rule(field: &'static str, label: &'static str, check: FieldCheck) -> FieldRule {
    FieldRule { field, label, check }
}

static STUDENT: EntityRules = EntityRules {
    checks: &[
        rule("name", "Name", FieldCheck::Required),
        rule("email", "Email", FieldCheck::Email),
        rule("rollNumber", "Roll number", FieldCheck::Required),
        rule("class", "Class", FieldCheck::Required),
        rule("phone", "phone number", FieldCheck::Phone),
        rule("whatsappNumber", "WhatsApp number", FieldCheck::Phone),
    ],
    trimmed: &[
        "name",
        "email",
        "rollNumber",
        "class",
        "section",
        "phone",
        "whatsappNumber",
        "guardianName",
        "address",
    ],
    passthrough: &["isActive"],
};

static TEACHER: EntityRules = EntityRules {
    checks: &[
        rule("name", "Name", FieldCheck::Required),
        rule("email", "Email", FieldCheck::Email),
        rule("employeeId", "Employee ID", FieldCheck::Required),
        rule("phone", "phone number", FieldCheck::Phone),
        rule("whatsappNumber", "WhatsApp number", FieldCheck::Phone),
    ],
    trimmed: &[
        "name",
        "email",
        "employeeId",
        "subject",
        "phone",
        "whatsappNumber",
        "qualification",
    ],
    passthrough: &["role", "isActive"],
};

pub fn rules_for(entity_type: EntityType) -> &'static EntityRules {
    match entity_type {
        EntityType::Student => &STUDENT,
        EntityType::Teacher => &TEACHER,
    }
}
