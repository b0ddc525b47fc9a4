// rollbook: batch reconciliation of school roster records

mod exit_codes;
mod lint;
mod logging;
mod run;
mod store;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use exit_codes::*;
use rollbook_migrate::{EntityType, MigrateError, StoreError};

#[derive(Parser)]
#[command(name = "rollbook")]
#[command(about = "Validate, normalize and repair student and teacher records")]
#[command(version)]
struct Cli {
    /// Debug-level diagnostics on stderr (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one reconciliation pass against the configured store
    #[command(after_help = "\
Examples:
  rollbook run nightly.toml
  rollbook run nightly.toml --json
  rollbook run nightly.toml --export-dir reports/
  rollbook run nightly.toml --strict        # exit 3 if any record failed

Press Ctrl+C to stop between records; partial results are still exported.

Exit codes:
  0   Run completed
  3   --strict and at least one record failed
  5   Cancelled
  10  Invalid config
  11  Store unreachable
  12  No signed-in actor
  13  Listing records failed
  14  Export files could not be written")]
    Run {
        /// Path to the TOML config
        config: PathBuf,

        /// Print the run result as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Write export files here instead of the configured directory
        #[arg(long, value_name = "DIR", conflicts_with = "no_export")]
        export_dir: Option<PathBuf>,

        /// Do not write export files
        #[arg(long)]
        no_export: bool,

        /// Exit non-zero when any record failed
        #[arg(long)]
        strict: bool,
    },

    /// Parse and validate a config without running it
    #[command(after_help = "\
Examples:
  rollbook validate nightly.toml")]
    Validate {
        /// Path to the TOML config
        config: PathBuf,
    },

    /// Check a JSON array of records offline; never writes
    #[command(after_help = "\
Examples:
  rollbook lint students.json --type student
  rollbook lint teachers.json --type teacher --json

Exit codes:
  0   Every record is valid and canonical
  4   At least one record is invalid or would be updated")]
    Lint {
        /// JSON file containing an array of records
        records: PathBuf,

        /// Entity type of the records
        #[arg(long = "type", value_name = "TYPE")]
        entity_type: EntityType,

        /// Print findings as JSON on stdout
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            config,
            json,
            export_dir,
            no_export,
            strict,
        } => run::cmd_run(run::RunArgs {
            config,
            json,
            export_dir,
            no_export,
            strict,
        }),
        Commands::Validate { config } => run::cmd_validate(config),
        Commands::Lint {
            records,
            entity_type,
            json,
        } => lint::cmd_lint(records, entity_type, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("error: {}", e.message);
            }
            if let Some(hint) = &e.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(e.code)
        }
    }
}

// ============================================================================
// Error type
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Exit with `code` after output has already been printed.
    pub fn silent(code: u8) -> Self {
        Self::new(code, "")
    }

    /// Create error from an engine error with proper exit code.
    pub fn migrate(err: MigrateError) -> Self {
        let code = migrate_exit_code(&err);
        let hint = match &err {
            MigrateError::Unreachable => {
                Some("check the [store] section and that the backend is running".to_string())
            }
            MigrateError::MissingActor => {
                Some("sign in, or set the token named by store.token_env".to_string())
            }
            MigrateError::ConfigParse(_) | MigrateError::ConfigValidation(_) => {
                Some("run `rollbook validate <config>` for details".to_string())
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    pub fn store(err: StoreError) -> Self {
        Self::new(EXIT_ERROR, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn lint_type_accepts_plural() {
        let cli = Cli::try_parse_from(["rollbook", "lint", "t.json", "--type", "teachers"]).unwrap();
        match cli.command {
            Commands::Lint { entity_type, .. } => assert_eq!(entity_type, EntityType::Teacher),
            _ => panic!("expected lint"),
        }
    }

    #[test]
    fn export_dir_conflicts_with_no_export() {
        let parsed = Cli::try_parse_from([
            "rollbook", "run", "c.toml", "--export-dir", "out", "--no-export",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn migrate_errors_carry_hints() {
        let err = CliError::migrate(MigrateError::Unreachable);
        assert_eq!(err.code, EXIT_UNREACHABLE);
        assert!(err.hint.is_some());
    }
}
