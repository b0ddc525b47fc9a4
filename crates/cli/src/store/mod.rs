//! Store adapters for `rollbook run`.
//!
//! The engine talks to these through its `EntitySource` / `Updater` /
//! `Preflight` traits; this module only picks and builds the right adapter
//! from the `[store]` config section.

pub mod file;
pub mod http;

use std::path::Path;
use std::time::Duration;

use rollbook_migrate::config::StoreConfig;
use rollbook_migrate::{EntitySource, Preflight, StoreError, Updater};

pub use file::FileStore;
pub use http::HttpStore;

/// Everything a run needs from a backend, behind one object.
pub trait Store: EntitySource + Updater + Preflight + Sync {}

impl<T: EntitySource + Updater + Preflight + Sync> Store for T {}

/// Build the adapter named by `config`. Relative file paths resolve against
/// `base_dir` (the config file's directory).
pub fn build_store(config: &StoreConfig, base_dir: &Path) -> Result<Box<dyn Store>, StoreError> {
    match config {
        StoreConfig::File { path } => {
            let path = base_dir.join(path);
            tracing::debug!(path = %path.display(), "using file store");
            Ok(Box::new(FileStore::new(path)))
        }
        StoreConfig::Http {
            base_url,
            token_env,
            page_size,
            timeout_secs,
        } => {
            let token = std::env::var(token_env).ok().filter(|t| !t.trim().is_empty());
            if token.is_none() {
                tracing::warn!(env = %token_env, "no API token set; requests are unauthenticated");
            }
            tracing::debug!(base_url = %base_url, page_size, "using HTTP store");
            let store = HttpStore::new(base_url, token, Duration::from_secs(*timeout_secs))?
                .with_page_size(*page_size);
            Ok(Box::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_paths_resolve_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("roster.json"), r#"{"students": [], "teachers": []}"#)
            .unwrap();
        let config = StoreConfig::File { path: "roster.json".into() };
        let store = build_store(&config, dir.path()).unwrap();
        assert!(store.is_reachable());
    }

    #[test]
    fn missing_file_is_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::File { path: "nope.json".into() };
        let store = build_store(&config, dir.path()).unwrap();
        assert!(!store.is_reachable());
    }
}
