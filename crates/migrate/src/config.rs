use std::collections::HashSet;

use serde::Deserialize;

use crate::error::MigrateError;
use crate::model::EntityType;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigrateConfig {
    pub name: String,
    /// Processing order.
    #[serde(default = "default_entity_types")]
    pub entity_types: Vec<EntityType>,
    /// Entity types processed concurrently. Records within a type never are.
    #[serde(default = "default_workers")]
    pub workers: usize,
    pub store: StoreConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

fn default_entity_types() -> Vec<EntityType> {
    EntityType::ALL.to_vec()
}

fn default_workers() -> usize {
    1
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Which store adapter the caller should build. The engine itself never
/// touches these settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum StoreConfig {
    /// JSON roster document on disk.
    File { path: String },
    /// REST backend.
    Http {
        base_url: String,
        #[serde(default = "default_token_env")]
        token_env: String,
        #[serde(default = "default_page_size")]
        page_size: u32,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_token_env() -> String {
    "ROLLBOOK_TOKEN".into()
}

fn default_page_size() -> u32 {
    10_000
}

fn default_timeout_secs() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    #[serde(default = "default_export_dir")]
    pub dir: String,
    #[serde(default = "default_true")]
    pub errors_csv: bool,
    #[serde(default = "default_true")]
    pub log_txt: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dir: default_export_dir(),
            errors_csv: true,
            log_txt: true,
        }
    }
}

fn default_export_dir() -> String {
    ".".into()
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl MigrateConfig {
    pub fn from_toml(input: &str) -> Result<Self, MigrateError> {
        let config: MigrateConfig =
            toml::from_str(input).map_err(|e| MigrateError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MigrateError> {
        if self.entity_types.is_empty() {
            return Err(MigrateError::ConfigValidation(
                "entity_types must name at least one type".into(),
            ));
        }

        let mut seen = HashSet::new();
        for ty in &self.entity_types {
            if !seen.insert(ty) {
                return Err(MigrateError::ConfigValidation(format!(
                    "entity type '{ty}' listed more than once"
                )));
            }
        }

        if self.workers == 0 {
            return Err(MigrateError::ConfigValidation(
                "workers must be at least 1".into(),
            ));
        }

        match &self.store {
            StoreConfig::File { path } if path.trim().is_empty() => {
                return Err(MigrateError::ConfigValidation(
                    "store.path must not be empty".into(),
                ));
            }
            StoreConfig::Http { base_url, .. }
                if !(base_url.starts_with("http://") || base_url.starts_with("https://")) =>
            {
                return Err(MigrateError::ConfigValidation(format!(
                    "store.base_url must be an http(s) URL, got '{base_url}'"
                )));
            }
            StoreConfig::Http { page_size: 0, .. } => {
                return Err(MigrateError::ConfigValidation(
                    "store.page_size must be at least 1".into(),
                ));
            }
            StoreConfig::Http { timeout_secs: 0, .. } => {
                return Err(MigrateError::ConfigValidation(
                    "store.timeout_secs must be at least 1".into(),
                ));
            }
            _ => {}
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_HTTP: &str = r#"
name = "Nightly cleanup"
entity_types = ["teacher", "student"]
workers = 2

[store]
kind = "http"
base_url = "https://school.example/api"

[export]
dir = "reports"
log_txt = false
"#;

    #[test]
    fn parse_valid_http() {
        let config = MigrateConfig::from_toml(VALID_HTTP).unwrap();
        assert_eq!(config.name, "Nightly cleanup");
        assert_eq!(config.entity_types, vec![EntityType::Teacher, EntityType::Student]);
        assert_eq!(config.workers, 2);
        assert_eq!(
            config.store,
            StoreConfig::Http {
                base_url: "https://school.example/api".into(),
                token_env: "ROLLBOOK_TOKEN".into(),
                page_size: 10_000,
                timeout_secs: 30,
            }
        );
        assert_eq!(config.export.dir, "reports");
        assert!(config.export.errors_csv);
        assert!(!config.export.log_txt);
    }

    #[test]
    fn unknown_store_key_rejected() {
        let err = MigrateConfig::from_toml(
            r#"
name = "Typo"

[store]
kind = "http"
base_url = "https://school.example/api"
timout_secs = 5
"#,
        )
        .unwrap_err();
        assert!(matches!(err, MigrateError::ConfigParse(_)));
        assert!(err.to_string().contains("timout_secs"), "{err}");

        let err = MigrateConfig::from_toml(
            r#"
name = "Stray"

[store]
kind = "file"
path = "roster.json"
base_url = "https://school.example/api"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, MigrateError::ConfigParse(_)));
    }

    #[test]
    fn parse_file_store_with_defaults() {
        let config = MigrateConfig::from_toml(
            r#"
name = "Local"

[store]
kind = "file"
path = "roster.json"
"#,
        )
        .unwrap();
        assert_eq!(config.entity_types, vec![EntityType::Student, EntityType::Teacher]);
        assert_eq!(config.workers, 1);
        assert_eq!(config.store, StoreConfig::File { path: "roster.json".into() });
        assert_eq!(config.export, ExportConfig::default());
    }

    #[test]
    fn reject_duplicate_types() {
        let err = MigrateConfig::from_toml(
            r#"
name = "Dup"
entity_types = ["student", "student"]
[store]
kind = "file"
path = "r.json"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn reject_empty_types() {
        let err = MigrateConfig::from_toml(
            r#"
name = "Empty"
entity_types = []
[store]
kind = "file"
path = "r.json"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("at least one type"));
    }

    #[test]
    fn reject_zero_workers() {
        let err = MigrateConfig::from_toml(
            r#"
name = "Zero"
workers = 0
[store]
kind = "file"
path = "r.json"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn reject_non_http_base_url() {
        let err = MigrateConfig::from_toml(
            r#"
name = "Bad URL"
[store]
kind = "http"
base_url = "school.example"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("http(s) URL"));
    }

    #[test]
    fn reject_unknown_entity_type() {
        let err = MigrateConfig::from_toml(
            r#"
name = "Parents"
entity_types = ["parent"]
[store]
kind = "file"
path = "r.json"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, MigrateError::ConfigParse(_)));
    }

    #[test]
    fn reject_unknown_store_kind() {
        let err = MigrateConfig::from_toml(
            r#"
name = "Sql"
[store]
kind = "postgres"
"#,
        );
        assert!(err.is_err(), "unknown store kind should fail deserialization");
    }
}
