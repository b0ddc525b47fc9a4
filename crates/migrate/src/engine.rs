use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use tracing::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::config::MigrateConfig;
use crate::detect::{drifted_fields, needs_update};
use crate::error::MigrateError;
use crate::ledger::ErrorLedger;
use crate::model::{
    Actor, EntityType, ErrorEntry, LogEntry, Record, RunResult, RunStatistics, RunStatus,
};
use crate::normalize::normalize;
use crate::source::{EntitySource, Preflight, Updater};
use crate::validate::validate;

/// What to reconcile and how many entity types may run at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigratePlan {
    pub entity_types: Vec<EntityType>,
    pub workers: usize,
}

impl Default for MigratePlan {
    fn default() -> Self {
        Self {
            entity_types: EntityType::ALL.to_vec(),
            workers: 1,
        }
    }
}

/// Terminal state of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Updated,
    Skipped,
    Invalid(Vec<String>),
    UpdateFailed(String),
}

/// Drive one record from `Validating` to a terminal state.
///
/// Validating → Invalid | Valid → CheckDiff → NoChange | Changed → Updating →
/// Success | Failure. The updater is only reached for valid, drifting records
/// and always receives the full normalized field set.
pub fn reconcile_record<U: Updater + ?Sized>(
    updater: &U,
    entity_type: EntityType,
    record: &Record,
) -> RecordOutcome {
    let validation = validate(entity_type, record);
    if !validation.is_valid {
        return RecordOutcome::Invalid(validation.issues);
    }

    if !needs_update(entity_type, record) {
        return RecordOutcome::Skipped;
    }

    debug!(
        %entity_type,
        id = %record.id,
        fields = ?drifted_fields(entity_type, record),
        "drift detected"
    );

    let fields = normalize(entity_type, record);
    match updater.apply(entity_type, &record.id, &fields) {
        Ok(()) => RecordOutcome::Updated,
        Err(e) => RecordOutcome::UpdateFailed(e.to_string()),
    }
}

/// Everything one entity type contributed to a run.
#[derive(Debug)]
struct TypeRun {
    entity_type: EntityType,
    /// `None` when the type was never fetched because the run was cancelled.
    stats: Option<RunStatistics>,
    ledger: ErrorLedger,
    log: Vec<LogEntry>,
    cancelled: bool,
}

impl TypeRun {
    fn not_started(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            stats: None,
            ledger: ErrorLedger::new(),
            log: vec![LogEntry::now(format!(
                "Skipped {}: run cancelled",
                entity_type.collection()
            ))],
            cancelled: true,
        }
    }
}

pub struct Migrator {
    plan: MigratePlan,
}

impl Migrator {
    pub fn new(plan: MigratePlan) -> Self {
        Self { plan }
    }

    pub fn from_config(config: &MigrateConfig) -> Self {
        Self::new(MigratePlan {
            entity_types: config.entity_types.clone(),
            workers: config.workers,
        })
    }

    /// Run one reconciliation pass.
    ///
    /// Fails before touching any record when the store is unreachable or no
    /// actor is signed in, and fails outright when a type cannot be fetched.
    /// Per-record failures never fail the run; they land in `errors`.
    pub fn run<S>(&self, store: &S, cancel: &CancelToken) -> Result<RunResult, MigrateError>
    where
        S: EntitySource + Updater + Preflight + Sync + ?Sized,
    {
        let actor = preflight(store)?;
        info!(actor = %actor.name, role = %actor.role, types = ?self.plan.entity_types, "migration started");

        let mut log = vec![LogEntry::now(format!(
            "Migration started by {} ({})",
            actor.name, actor.role
        ))];

        let type_runs = if self.plan.workers <= 1 || self.plan.entity_types.len() <= 1 {
            self.run_sequential(store, cancel)?
        } else {
            self.run_parallel(store, cancel)?
        };

        let mut stats = std::collections::BTreeMap::new();
        let mut ledger = ErrorLedger::new();
        let mut cancelled = false;
        for run in type_runs {
            if let Some(type_stats) = run.stats {
                stats.insert(run.entity_type, type_stats);
            }
            ledger.absorb(run.ledger);
            log.extend(run.log);
            cancelled |= run.cancelled;
        }

        let (updated, skipped, errors) = stats.values().fold((0, 0, 0), |acc, s| {
            (acc.0 + s.updated, acc.1 + s.skipped, acc.2 + s.errors)
        });
        let status = if cancelled {
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        };
        let verb = match status {
            RunStatus::Completed => "completed",
            RunStatus::Cancelled => "cancelled",
        };
        log.push(LogEntry::now(format!(
            "Migration {verb}: {updated} updated, {skipped} skipped, {errors} errors"
        )));
        info!(updated, skipped, errors, ?status, "migration finished");

        Ok(RunResult {
            status,
            actor,
            stats,
            errors: ledger.into_entries(),
            log,
        })
    }

    fn run_sequential<S>(&self, store: &S, cancel: &CancelToken) -> Result<Vec<TypeRun>, MigrateError>
    where
        S: EntitySource + Updater + ?Sized,
    {
        self.plan
            .entity_types
            .iter()
            .map(|&ty| run_type(store, ty, cancel))
            .collect()
    }

    /// Up to `workers` entity types at once. Each worker owns the stats,
    /// ledger and log of the type it is processing; results are merged in
    /// plan order so the output matches a sequential run.
    fn run_parallel<S>(&self, store: &S, cancel: &CancelToken) -> Result<Vec<TypeRun>, MigrateError>
    where
        S: EntitySource + Updater + Sync + ?Sized,
    {
        let types = &self.plan.entity_types;
        let next = &AtomicUsize::new(0);
        let aborted = &AtomicBool::new(false);
        let workers = self.plan.workers.min(types.len());

        let mut slots: Vec<Option<Result<TypeRun, MigrateError>>> =
            (0..types.len()).map(|_| None).collect();

        thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(move |_| {
                    scope.spawn(move || {
                        let mut done = Vec::new();
                        while !aborted.load(Ordering::SeqCst) {
                            let idx = next.fetch_add(1, Ordering::SeqCst);
                            let Some(&ty) = types.get(idx) else { break };
                            let result = run_type(store, ty, cancel);
                            if result.is_err() {
                                aborted.store(true, Ordering::SeqCst);
                            }
                            done.push((idx, result));
                        }
                        done
                    })
                })
                .collect();

            for handle in handles {
                match handle.join() {
                    Ok(done) => {
                        for (idx, result) in done {
                            slots[idx] = Some(result);
                        }
                    }
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
        });

        // A slot is only empty when another type's fetch failed first.
        let mut runs = Vec::with_capacity(types.len());
        for (slot, &ty) in slots.into_iter().zip(types) {
            match slot {
                Some(Ok(run)) => runs.push(run),
                Some(Err(e)) => return Err(e),
                None => runs.push(TypeRun::not_started(ty)),
            }
        }
        Ok(runs)
    }
}

fn preflight<P: Preflight + ?Sized>(store: &P) -> Result<Actor, MigrateError> {
    if !store.is_reachable() {
        error!("backend unreachable, aborting before any fetch");
        return Err(MigrateError::Unreachable);
    }
    match store.current_actor() {
        Ok(Some(actor)) => Ok(actor),
        Ok(None) => {
            error!("no current actor, aborting");
            Err(MigrateError::MissingActor)
        }
        Err(e) => {
            error!(error = %e, "actor lookup failed, aborting");
            Err(MigrateError::Identity(e.to_string()))
        }
    }
}

/// Fetch one type and reconcile its records one at a time, in fetch order.
fn run_type<S>(store: &S, entity_type: EntityType, cancel: &CancelToken) -> Result<TypeRun, MigrateError>
where
    S: EntitySource + Updater + ?Sized,
{
    if cancel.is_cancelled() {
        return Ok(TypeRun::not_started(entity_type));
    }

    let records = store.fetch_all(entity_type).map_err(|e| {
        error!(%entity_type, error = %e, "fetch failed, aborting run");
        MigrateError::Fetch {
            entity_type,
            message: e.to_string(),
        }
    })?;

    let collection = entity_type.collection();
    let mut stats = RunStatistics::fetched(records.len());
    let mut ledger = ErrorLedger::new();
    let mut log = vec![LogEntry::now(format!("Fetched {} {collection}", records.len()))];
    let mut cancelled = false;
    info!(%entity_type, total = stats.total, "records fetched");

    for (i, record) in records.iter().enumerate() {
        if cancel.is_cancelled() {
            cancelled = true;
            log.push(LogEntry::now(format!(
                "Cancelled {collection} after {i} of {} records",
                stats.total
            )));
            warn!(%entity_type, processed = i, total = stats.total, "cancelled between records");
            break;
        }

        let name = record.display_name();
        match reconcile_record(store, entity_type, record) {
            RecordOutcome::Updated => {
                stats.updated += 1;
                log.push(LogEntry::now(format!(
                    "Updated {entity_type} {} ({name})",
                    record.id
                )));
                debug!(%entity_type, id = %record.id, "updated");
            }
            RecordOutcome::Skipped => {
                stats.skipped += 1;
                debug!(%entity_type, id = %record.id, "already canonical");
            }
            RecordOutcome::Invalid(issues) => {
                stats.errors += 1;
                let message = format!("Validation failed: {}", issues.join(", "));
                warn!(%entity_type, id = %record.id, %message, "record invalid");
                log.push(LogEntry::now(format!(
                    "Error {entity_type} {} ({name}): {message}",
                    record.id
                )));
                ledger.append(ErrorEntry {
                    entity_type,
                    id: record.id.clone(),
                    name,
                    message,
                });
            }
            RecordOutcome::UpdateFailed(message) => {
                stats.errors += 1;
                warn!(%entity_type, id = %record.id, %message, "update failed");
                log.push(LogEntry::now(format!(
                    "Error {entity_type} {} ({name}): {message}",
                    record.id
                )));
                ledger.append(ErrorEntry {
                    entity_type,
                    id: record.id.clone(),
                    name,
                    message,
                });
            }
        }
    }

    log.push(LogEntry::now(format!(
        "Finished {collection}: {} total, {} updated, {} skipped, {} errors",
        stats.total, stats.updated, stats.skipped, stats.errors
    )));
    info!(
        %entity_type,
        total = stats.total,
        updated = stats.updated,
        skipped = stats.skipped,
        errors = stats.errors,
        "entity type finished"
    );

    Ok(TypeRun {
        entity_type,
        stats: Some(stats),
        ledger,
        log,
        cancelled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::model::NormalizedFields;
    use crate::source::{MemoryStore, Roster};
    use serde_json::json;
    use std::sync::Mutex;

    fn actor() -> Actor {
        Actor {
            name: "Admin".into(),
            role: "admin".into(),
        }
    }

    fn student(id: &str, name: &str, email: &str) -> Record {
        Record::new(id)
            .with("name", name)
            .with("email", email)
            .with("rollNumber", "R1")
            .with("class", "5A")
    }

    fn store(students: Vec<Record>) -> MemoryStore {
        MemoryStore::new(Roster {
            actor: Some(actor()),
            students,
            teachers: Vec::new(),
        })
    }

    fn students_only() -> Migrator {
        Migrator::new(MigratePlan {
            entity_types: vec![EntityType::Student],
            workers: 1,
        })
    }

    /// Updater that records every payload it receives.
    #[derive(Default)]
    struct Capture(Mutex<Vec<NormalizedFields>>);

    impl Updater for Capture {
        fn apply(&self, _: EntityType, _: &str, fields: &NormalizedFields) -> Result<(), StoreError> {
            self.0.lock().unwrap().push(fields.clone());
            Ok(())
        }
    }

    #[test]
    fn record_with_trailing_space_is_updated_with_full_field_set() {
        let capture = Capture::default();
        let rec = student("s1", "Ann ", "ann@x.com");
        let outcome = reconcile_record(&capture, EntityType::Student, &rec);
        assert_eq!(outcome, RecordOutcome::Updated);
        let sent = capture.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["name"], json!("Ann"));
        // Unchanged fields are resubmitted too.
        assert_eq!(sent[0]["email"], json!("ann@x.com"));
        assert_eq!(sent[0]["class"], json!("5A"));
    }

    #[test]
    fn canonical_record_never_reaches_updater() {
        let capture = Capture::default();
        let outcome = reconcile_record(&capture, EntityType::Student, &student("s1", "Ann", "ann@x.com"));
        assert_eq!(outcome, RecordOutcome::Skipped);
        assert!(capture.0.lock().unwrap().is_empty());
    }

    #[test]
    fn invalid_record_never_reaches_updater() {
        let capture = Capture::default();
        let outcome = reconcile_record(&capture, EntityType::Student, &student("s1", " ", "bad-email"));
        assert_eq!(
            outcome,
            RecordOutcome::Invalid(vec!["Name is required".into(), "Invalid email format".into()])
        );
        assert!(capture.0.lock().unwrap().is_empty());
    }

    #[test]
    fn run_counts_each_terminal_state() {
        let store = store(vec![
            student("s1", "Ann ", "ann@x.com"),
            student("s2", "Bo", "bo@x.com"),
            student("s3", "", "bad-email"),
        ]);
        let result = students_only().run(&store, &CancelToken::new()).unwrap();
        let stats = result.stats[&EntityType::Student];
        assert_eq!(stats, RunStatistics { total: 3, updated: 1, skipped: 1, errors: 1 });
        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].id, "s3");
        assert_eq!(result.errors[0].name, "s3");
        assert_eq!(
            result.errors[0].message,
            "Validation failed: Name is required, Invalid email format"
        );
    }

    #[test]
    fn update_failure_becomes_ledger_entry() {
        let store = store(vec![
            student("s1", "Ann ", "ann@x.com"),
            student("s2", "Bo ", "bo@x.com"),
        ])
        .fail_update("s1", StoreError::Rejected("email already taken".into()));
        let result = students_only().run(&store, &CancelToken::new()).unwrap();
        let stats = result.stats[&EntityType::Student];
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.updated, 1);
        assert_eq!(result.errors[0].name, "Ann");
        assert_eq!(result.errors[0].message, "rejected by store: email already taken");
    }

    #[test]
    fn unreachable_aborts_before_fetch() {
        let store = store(vec![student("s1", "Ann ", "ann@x.com")]).unreachable();
        let err = students_only().run(&store, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, MigrateError::Unreachable));
        assert_eq!(store.fetch_calls(), 0);
        assert!(store.applied().is_empty());
    }

    #[test]
    fn missing_actor_aborts_before_fetch() {
        let store = MemoryStore::new(Roster {
            actor: None,
            students: vec![student("s1", "Ann ", "ann@x.com")],
            teachers: Vec::new(),
        });
        let err = students_only().run(&store, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, MigrateError::MissingActor));
        assert_eq!(store.fetch_calls(), 0);
    }

    #[test]
    fn fetch_failure_aborts_run() {
        let store = store(vec![student("s1", "Ann ", "ann@x.com")]).fail_fetch(EntityType::Teacher);
        let err = Migrator::new(MigratePlan::default())
            .run(&store, &CancelToken::new())
            .unwrap_err();
        match err {
            MigrateError::Fetch { entity_type, .. } => assert_eq!(entity_type, EntityType::Teacher),
            other => panic!("expected fetch error, got {other:?}"),
        }
    }

    #[test]
    fn cancelled_before_start_touches_nothing() {
        let store = store(vec![student("s1", "Ann ", "ann@x.com")]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = students_only().run(&store, &cancel).unwrap();
        assert_eq!(result.status, RunStatus::Cancelled);
        assert!(result.stats.is_empty());
        assert_eq!(store.fetch_calls(), 0);
        assert!(store.applied().is_empty());
    }

    /// Cancels the shared token as soon as the first update lands.
    struct CancelAfterFirst<'a> {
        inner: &'a MemoryStore,
        cancel: CancelToken,
    }

    impl EntitySource for CancelAfterFirst<'_> {
        fn fetch_all(&self, ty: EntityType) -> Result<Vec<Record>, StoreError> {
            self.inner.fetch_all(ty)
        }
    }

    impl Updater for CancelAfterFirst<'_> {
        fn apply(&self, ty: EntityType, id: &str, f: &NormalizedFields) -> Result<(), StoreError> {
            self.inner.apply(ty, id, f)?;
            self.cancel.cancel();
            Ok(())
        }
    }

    impl Preflight for CancelAfterFirst<'_> {
        fn is_reachable(&self) -> bool {
            self.inner.is_reachable()
        }
        fn current_actor(&self) -> Result<Option<Actor>, StoreError> {
            self.inner.current_actor()
        }
    }

    #[test]
    fn cancellation_is_checked_between_records() {
        let inner = store(vec![
            student("s1", "Ann ", "ann@x.com"),
            student("s2", "Bo ", "bo@x.com"),
            student("s3", "Cy ", "cy@x.com"),
        ]);
        let cancel = CancelToken::new();
        let wrapped = CancelAfterFirst {
            inner: &inner,
            cancel: cancel.clone(),
        };
        let result = students_only().run(&wrapped, &cancel).unwrap();
        assert!(result.is_cancelled());
        let stats = result.stats[&EntityType::Student];
        assert_eq!(stats.total, 3);
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.processed(), 1);
        assert_eq!(inner.applied().len(), 1);
    }

    #[test]
    fn log_brackets_the_run() {
        let store = store(vec![student("s1", "Ann ", "ann@x.com")]);
        let result = students_only().run(&store, &CancelToken::new()).unwrap();
        let messages: Vec<_> = result.log.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages.first(), Some(&"Migration started by Admin (admin)"));
        assert!(messages.contains(&"Fetched 1 students"));
        assert!(messages.contains(&"Updated student s1 (Ann)"));
        assert_eq!(
            messages.last(),
            Some(&"Migration completed: 1 updated, 0 skipped, 0 errors")
        );
    }
}
