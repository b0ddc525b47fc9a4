//! `rollbook run` and `rollbook validate`.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use serde::Serialize;

use rollbook_migrate::report::{errors_filename, log_filename, summary_lines, to_error_table, to_log_text};
use rollbook_migrate::model::{Actor, RunSummary};
use rollbook_migrate::{CancelToken, MigrateConfig, Migrator, RunResult, RunStatus};

use crate::exit_codes::*;
use crate::store::build_store;
use crate::CliError;

pub struct RunArgs {
    pub config: PathBuf,
    pub json: bool,
    pub export_dir: Option<PathBuf>,
    pub no_export: bool,
    pub strict: bool,
}

/// What `--json` prints: the run summary plus the files it produced. The
/// full log goes to the exported text file, not stdout.
#[derive(Serialize)]
struct RunOutput<'a> {
    status: RunStatus,
    actor: &'a Actor,
    #[serde(flatten)]
    summary: RunSummary,
    exports: Vec<String>,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

fn load_config(path: &Path) -> Result<MigrateConfig, CliError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::usage(format!("cannot read {}: {}", path.display(), e)))?;
    MigrateConfig::from_toml(&text).map_err(|e| {
        CliError::new(EXIT_CONFIG_INVALID, format!("{}: {}", path.display(), e))
    })
}

/// Directory relative paths in the config resolve against.
fn config_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn cmd_validate(config: PathBuf) -> Result<(), CliError> {
    let parsed = load_config(&config)?;
    let types: Vec<String> = parsed.entity_types.iter().map(|t| t.to_string()).collect();
    println!(
        "{}: ok ({}; {} worker{})",
        parsed.name,
        types.join(", "),
        parsed.workers,
        if parsed.workers == 1 { "" } else { "s" }
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let config = load_config(&args.config)?;
    let base_dir = config_dir(&args.config);
    let store = build_store(&config.store, &base_dir).map_err(CliError::store)?;

    let cancel = CancelToken::new();
    install_ctrlc(&cancel);

    tracing::info!(name = %config.name, "starting run");
    let migrator = Migrator::from_config(&config);
    let result = migrator.run(&*store, &cancel).map_err(|e| {
        tracing::error!(error = %e, "run aborted");
        CliError::migrate(e)
    })?;

    let exports = if args.no_export {
        Vec::new()
    } else {
        let dir = match &args.export_dir {
            Some(dir) => dir.clone(),
            None => base_dir.join(&config.export.dir),
        };
        let today = Local::now().date_naive();
        write_exports(&result, &dir, today, config.export.errors_csv, config.export.log_txt)?
    };

    if args.json {
        let output = RunOutput {
            status: result.status,
            actor: &result.actor,
            summary: result.summary(),
            exports: exports.iter().map(|p| p.display().to_string()).collect(),
        };
        let json = serde_json::to_string_pretty(&output)
            .map_err(|e| CliError::new(EXIT_ERROR, format!("cannot encode result: {e}")))?;
        println!("{json}");
    } else {
        print_summary(&result, &exports);
    }

    run_exit(&result, args.strict)
}

fn install_ctrlc(cancel: &CancelToken) {
    let token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("\ncancelling after the current record...");
        token.cancel();
    }) {
        tracing::warn!(error = %e, "cannot install Ctrl+C handler");
    }
}

fn run_exit(result: &RunResult, strict: bool) -> Result<(), CliError> {
    if result.status == RunStatus::Cancelled {
        return Err(CliError::silent(EXIT_RUN_CANCELLED));
    }
    if strict && result.total_errors() > 0 {
        return Err(CliError::new(
            EXIT_RUN_RECORD_ERRORS,
            format!("{} record(s) failed", result.total_errors()),
        ));
    }
    Ok(())
}

fn print_summary(result: &RunResult, exports: &[PathBuf]) {
    println!("Run by {} ({})", result.actor.name, result.actor.role);
    for line in summary_lines(result) {
        println!("  {line}");
    }
    if !result.errors.is_empty() {
        println!();
        println!("Errors:");
        for e in &result.errors {
            println!("  {} {} ({}): {}", e.entity_type, e.id, e.name, e.message);
        }
    }
    if result.status == RunStatus::Cancelled {
        println!();
        println!("Cancelled before every record was processed.");
    }
    for path in exports {
        println!("wrote {}", path.display());
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Write the error table and run log into `dir`, creating it if needed.
/// Returns the paths written, in that order.
fn write_exports(
    result: &RunResult,
    dir: &Path,
    date: NaiveDate,
    errors_csv: bool,
    log_txt: bool,
) -> Result<Vec<PathBuf>, CliError> {
    let export_err = |path: &Path, e: std::io::Error| {
        CliError::new(EXIT_EXPORT_FAILED, format!("cannot write {}: {}", path.display(), e))
    };

    if errors_csv || log_txt {
        std::fs::create_dir_all(dir).map_err(|e| export_err(dir, e))?;
    }

    let mut written = Vec::new();
    if errors_csv {
        let path = dir.join(errors_filename(date));
        let table = to_error_table(&result.errors).map_err(|e| {
            CliError::new(EXIT_EXPORT_FAILED, format!("cannot render error table: {e}"))
        })?;
        std::fs::write(&path, table).map_err(|e| export_err(&path, e))?;
        written.push(path);
    }
    if log_txt {
        let path = dir.join(log_filename(date));
        std::fs::write(&path, to_log_text(&result.log)).map_err(|e| export_err(&path, e))?;
        written.push(path);
    }
    for path in &written {
        tracing::info!(path = %path.display(), "exported");
    }
    Ok(written)
}
