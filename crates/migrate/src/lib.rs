//! `rollbook-migrate`: batch record reconciliation engine.
//!
//! Pure engine crate: pulls records through the [`source`] traits, validates
//! and normalizes them, pushes corrective updates only on drift, and returns
//! a [`RunResult`] with per-type counts, an error ledger and a run log.
//! No CLI or transport dependencies.

pub mod cancel;
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod model;
pub mod normalize;
pub mod report;
pub mod rules;
pub mod source;
pub mod validate;

pub use cancel::CancelToken;
pub use config::MigrateConfig;
pub use engine::{MigratePlan, Migrator};
pub use error::{MigrateError, StoreError};
pub use model::{EntityType, ErrorEntry, Record, RunResult, RunStatistics, RunStatus};
pub use source::{EntitySource, MemoryStore, Preflight, Roster, Updater};
