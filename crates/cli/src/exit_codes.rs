//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 3-9     | run / lint       | Completed, but with findings             |
//! | 10-19   | preconditions    | Run aborted before or while fetching     |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use rollbook_migrate::MigrateError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unreadable input file.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Findings (3-9)
// =============================================================================

/// `run --strict` finished but at least one record failed.
pub const EXIT_RUN_RECORD_ERRORS: u8 = 3;

/// `lint` found invalid or drifting records.
pub const EXIT_LINT_FINDINGS: u8 = 4;

/// Run was cancelled (Ctrl+C) between records. Partial results were exported.
pub const EXIT_RUN_CANCELLED: u8 = 5;

// =============================================================================
// Preconditions (10-19)
// =============================================================================

/// Config file failed to parse or validate.
pub const EXIT_CONFIG_INVALID: u8 = 10;

/// Backend connectivity probe failed.
pub const EXIT_UNREACHABLE: u8 = 11;

/// No signed-in actor, or the identity lookup failed.
pub const EXIT_NO_ACTOR: u8 = 12;

/// Listing an entity type failed; the run was aborted.
pub const EXIT_FETCH_FAILED: u8 = 13;

/// Run finished but the export files could not be written.
pub const EXIT_EXPORT_FAILED: u8 = 14;

/// Map an engine error to its exit code.
pub fn migrate_exit_code(err: &MigrateError) -> u8 {
    match err {
        MigrateError::Unreachable => EXIT_UNREACHABLE,
        MigrateError::MissingActor | MigrateError::Identity(_) => EXIT_NO_ACTOR,
        MigrateError::Fetch { .. } => EXIT_FETCH_FAILED,
        MigrateError::ConfigParse(_) | MigrateError::ConfigValidation(_) => EXIT_CONFIG_INVALID,
    }
}
