use thiserror::Error;

use crate::model::EntityType;

/// Run-level failures. Any of these aborts the whole run.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// Connectivity probe returned false.
    #[error("backend is unreachable")]
    Unreachable,
    /// No actor is signed in; a run cannot be attributed.
    #[error("no current user: sign in before running a migration")]
    MissingActor,
    /// Resolving the actor failed outright.
    #[error("cannot resolve current user: {0}")]
    Identity(String),
    /// Fetching the records of one entity type failed.
    #[error("cannot fetch {entity_type} records: {message}")]
    Fetch {
        entity_type: EntityType,
        message: String,
    },
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (empty type list, duplicate type, bad worker count, ...).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
}

/// Failures reported by a store collaborator (fetch, apply, identity).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record '{id}' not found")]
    NotFound { id: String },
    /// The store refused the write (remote validation).
    #[error("rejected by store: {0}")]
    Rejected(String),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("I/O error: {0}")]
    Io(String),
}
