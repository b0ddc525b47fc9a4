//! `rollbook lint`: offline validation and drift report. Never writes.

use std::path::PathBuf;

use serde::Serialize;

use rollbook_migrate::detect::drifted_fields;
use rollbook_migrate::validate::validate;
use rollbook_migrate::{EntityType, Record};

use crate::exit_codes::*;
use crate::CliError;

#[derive(Debug, Serialize, PartialEq)]
struct Finding {
    id: String,
    name: String,
    /// Validation issues; a record with issues would be reported as an error.
    issues: Vec<String>,
    /// Fields a run would rewrite. Only computed for valid records.
    drift: Vec<String>,
}

#[derive(Debug, Serialize)]
struct LintReport {
    entity_type: EntityType,
    checked: usize,
    invalid: usize,
    drifting: usize,
    findings: Vec<Finding>,
}

fn lint_records(entity_type: EntityType, records: &[Record]) -> LintReport {
    let mut findings = Vec::new();
    let (mut invalid, mut drifting) = (0, 0);

    for record in records {
        let validation = validate(entity_type, record);
        let drift = if validation.is_valid {
            drifted_fields(entity_type, record)
        } else {
            Vec::new()
        };
        if !validation.is_valid {
            invalid += 1;
        } else if !drift.is_empty() {
            drifting += 1;
        } else {
            continue;
        }
        findings.push(Finding {
            id: record.id.clone(),
            name: record.display_name(),
            issues: validation.issues,
            drift,
        });
    }

    LintReport {
        entity_type,
        checked: records.len(),
        invalid,
        drifting,
        findings,
    }
}

pub fn cmd_lint(path: PathBuf, entity_type: EntityType, json: bool) -> Result<(), CliError> {
    let text = std::fs::read_to_string(&path)
        .map_err(|e| CliError::usage(format!("cannot read {}: {}", path.display(), e)))?;
    let records: Vec<Record> = serde_json::from_str(&text).map_err(|e| {
        CliError::usage(format!("{}: {}", path.display(), e))
            .with_hint("expected a JSON array of records, each with a string \"id\"")
    })?;

    let report = lint_records(entity_type, &records);
    tracing::debug!(
        checked = report.checked,
        invalid = report.invalid,
        drifting = report.drifting,
        "lint finished"
    );

    if json {
        let out = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::new(EXIT_ERROR, format!("cannot encode report: {e}")))?;
        println!("{out}");
    } else {
        for f in &report.findings {
            if f.issues.is_empty() {
                println!("{} ({}): would update {}", f.id, f.name, f.drift.join(", "));
            } else {
                println!("{} ({}): {}", f.id, f.name, f.issues.join(", "));
            }
        }
        println!(
            "{} {} checked, {} invalid, {} would update",
            report.checked,
            entity_type.collection(),
            report.invalid,
            report.drifting
        );
    }

    if report.findings.is_empty() {
        Ok(())
    } else {
        Err(CliError::silent(EXIT_LINT_FINDINGS))
    }
}
