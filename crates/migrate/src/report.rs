//! Rendering of run output for export. Pure: no files, no network.

use chrono::{NaiveDate, SecondsFormat};

use crate::model::{ErrorEntry, LogEntry, RunResult};

pub const ERROR_TABLE_HEADER: [&str; 4] = ["Type", "ID", "Name", "Error"];

/// Error ledger as CSV: fixed `Type,ID,Name,Error` header, then one fully
/// quoted row per entry in ledger order. The header is written even when
/// there are no entries.
pub fn to_error_table(errors: &[ErrorEntry]) -> Result<String, csv::Error> {
    let mut out = ERROR_TABLE_HEADER.join(",");
    out.push('\n');

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    for e in errors {
        writer.write_record([
            e.entity_type.label(),
            e.id.as_str(),
            e.name.as_str(),
            e.message.as_str(),
        ])?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    out.push_str(&String::from_utf8_lossy(&bytes));
    Ok(out)
}

/// One `[timestamp] message` line per entry, in insertion order.
pub fn format_log_line(entry: &LogEntry) -> String {
    format!(
        "[{}] {}",
        entry.at.to_rfc3339_opts(SecondsFormat::Secs, true),
        entry.message
    )
}

pub fn to_log_text(log: &[LogEntry]) -> String {
    log.iter().map(format_log_line).collect::<Vec<_>>().join("\n")
}

pub fn errors_filename(date: NaiveDate) -> String {
    format!("migration-errors-{}.csv", date.format("%Y-%m-%d"))
}

pub fn log_filename(date: NaiveDate) -> String {
    format!("migration-log-{}.txt", date.format("%Y-%m-%d"))
}

/// One human-readable line per processed entity type, in type order.
pub fn summary_lines(result: &RunResult) -> Vec<String> {
    result
        .stats
        .iter()
        .map(|(ty, s)| {
            format!(
                "{}: {} total, {} updated, {} skipped, {} errors",
                ty.collection(),
                s.total,
                s.updated,
                s.skipped,
                s.errors
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityType;
    use chrono::{TimeZone, Utc};

    fn entry(ty: EntityType, id: &str, name: &str, message: &str) -> ErrorEntry {
        ErrorEntry {
            entity_type: ty,
            id: id.into(),
            name: name.into(),
            message: message.into(),
        }
    }

    #[test]
    fn empty_ledger_still_has_header() {
        assert_eq!(to_error_table(&[]).unwrap(), "Type,ID,Name,Error\n");
    }

    #[test]
    fn two_entries_make_three_lines() {
        let table = to_error_table(&[
            entry(EntityType::Student, "s1", "Ann", "Validation failed: Name is required"),
            entry(EntityType::Teacher, "t9", "Bo", "HTTP 500: boom"),
        ])
        .unwrap();
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Type,ID,Name,Error");
        assert_eq!(
            lines[1],
            r#""Student","s1","Ann","Validation failed: Name is required""#
        );
        assert_eq!(lines[2], r#""Teacher","t9","Bo","HTTP 500: boom""#);
    }

    #[test]
    fn embedded_quotes_and_commas_are_escaped() {
        let table = to_error_table(&[entry(
            EntityType::Student,
            "s1",
            "O\"Neil, Pat",
            "Validation failed: Name is required, Invalid email format",
        )])
        .unwrap();
        let row = table.lines().nth(1).unwrap();
        assert_eq!(
            row,
            r#""Student","s1","O""Neil, Pat","Validation failed: Name is required, Invalid email format""#
        );

        let mut reader = csv::Reader::from_reader(table.as_bytes());
        let rec = reader.records().next().unwrap().unwrap();
        assert_eq!(rec.len(), 4);
        assert_eq!(&rec[2], "O\"Neil, Pat");
    }

    #[test]
    fn log_text_keeps_order() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let log = vec![
            LogEntry { at, message: "first".into() },
            LogEntry { at, message: "second".into() },
        ];
        assert_eq!(
            to_log_text(&log),
            "[2026-03-01T09:30:00Z] first\n[2026-03-01T09:30:00Z] second"
        );
        assert_eq!(to_log_text(&[]), "");
    }

    #[test]
    fn export_filenames_use_iso_date() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        assert_eq!(errors_filename(date), "migration-errors-2026-01-05.csv");
        assert_eq!(log_filename(date), "migration-log-2026-01-05.txt");
    }
}
