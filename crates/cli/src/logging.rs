//! Diagnostic logging for the CLI.
//!
//! Installs a `tracing` subscriber on stderr:
//! - `RUST_LOG` environment filter support
//! - Default level: `rollbook=info` (`--verbose` raises it to debug)
//! - JSON output when `ROLLBOOK_LOG_FORMAT=json`
//!
//! This is separate from the run log kept inside `RunResult`, which is data
//! and is always exported.

use tracing_subscriber::EnvFilter;

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "rollbook=debug,rollbook_migrate=debug"
    } else {
        "rollbook=info,rollbook_migrate=info"
    }
}

/// Initialize the global subscriber. Subsequent calls are no-ops.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let is_json = std::env::var("ROLLBOOK_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    if is_json {
        let _ = subscriber.json().try_init();
    } else {
        let _ = subscriber.try_init();
    }
}
