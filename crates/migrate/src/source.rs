//! Collaborator boundary: where records come from and where fixes go.
//!
//! The engine only sees these traits. Transport, auth and pagination belong
//! to the implementations (see the CLI's file and HTTP stores).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::{Actor, EntityType, NormalizedFields, Record};

pub trait EntitySource {
    /// Every record of one type, in store order, in one logical call.
    fn fetch_all(&self, entity_type: EntityType) -> Result<Vec<Record>, StoreError>;
}

pub trait Updater {
    /// Replace the mutable fields of one record with `fields`. Applying the
    /// same fields twice must be a no-op on the store side.
    fn apply(
        &self,
        entity_type: EntityType,
        id: &str,
        fields: &NormalizedFields,
    ) -> Result<(), StoreError>;
}

/// Run preconditions: reachability and the identity the run is attributed to.
pub trait Preflight {
    fn is_reachable(&self) -> bool;
    fn current_actor(&self) -> Result<Option<Actor>, StoreError>;
}

// ---------------------------------------------------------------------------
// Roster document
// ---------------------------------------------------------------------------

/// Serialized store snapshot: `{ "actor": ..., "students": [...], "teachers": [...] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
    #[serde(default)]
    pub actor: Option<Actor>,
    #[serde(default)]
    pub students: Vec<Record>,
    #[serde(default)]
    pub teachers: Vec<Record>,
}

impl Roster {
    pub fn from_json(input: &str) -> Result<Self, StoreError> {
        serde_json::from_str(input).map_err(|e| StoreError::Parse(e.to_string()))
    }

    pub fn records(&self, entity_type: EntityType) -> &[Record] {
        match entity_type {
            EntityType::Student => &self.students,
            EntityType::Teacher => &self.teachers,
        }
    }

    pub fn records_mut(&mut self, entity_type: EntityType) -> &mut Vec<Record> {
        match entity_type {
            EntityType::Student => &mut self.students,
            EntityType::Teacher => &mut self.teachers,
        }
    }

    /// Merge `fields` into the record with `id`. Fields not in the set are kept.
    pub fn merge(
        &mut self,
        entity_type: EntityType,
        id: &str,
        fields: &NormalizedFields,
    ) -> Result<(), StoreError> {
        let record = self
            .records_mut(entity_type)
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        for (field, value) in fields {
            record.fields.insert(field.clone(), value.clone());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// In-memory store implementing every collaborator trait, with failure
/// injection for tests and dry embedding.
#[derive(Debug)]
pub struct MemoryStore {
    roster: Mutex<Roster>,
    reachable: bool,
    failing_fetch: HashSet<EntityType>,
    failing_updates: HashMap<String, StoreError>,
    fetch_calls: AtomicUsize,
    attempts: Mutex<Vec<(EntityType, String)>>,
    applied: Mutex<Vec<(EntityType, String)>>,
}

impl MemoryStore {
    pub fn new(roster: Roster) -> Self {
        Self {
            roster: Mutex::new(roster),
            reachable: true,
            failing_fetch: HashSet::new(),
            failing_updates: HashMap::new(),
            fetch_calls: AtomicUsize::new(0),
            attempts: Mutex::new(Vec::new()),
            applied: Mutex::new(Vec::new()),
        }
    }

    pub fn from_json(input: &str) -> Result<Self, StoreError> {
        Ok(Self::new(Roster::from_json(input)?))
    }

    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    pub fn fail_fetch(mut self, entity_type: EntityType) -> Self {
        self.failing_fetch.insert(entity_type);
        self
    }

    /// Every `apply` for `id` fails with `err`.
    pub fn fail_update(mut self, id: &str, err: StoreError) -> Self {
        self.failing_updates.insert(id.to_string(), err);
        self
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Every `apply` call, failed or not, in call order.
    pub fn attempts(&self) -> Vec<(EntityType, String)> {
        self.attempts.lock().map(|a| a.clone()).unwrap_or_default()
    }

    /// Successful `apply` calls, in call order.
    pub fn applied(&self) -> Vec<(EntityType, String)> {
        self.applied.lock().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn snapshot(&self) -> Roster {
        self.roster.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn lock_roster(&self) -> Result<std::sync::MutexGuard<'_, Roster>, StoreError> {
        self.roster
            .lock()
            .map_err(|_| StoreError::Io("memory store lock poisoned".into()))
    }
}

impl EntitySource for MemoryStore {
    fn fetch_all(&self, entity_type: EntityType) -> Result<Vec<Record>, StoreError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_fetch.contains(&entity_type) {
            return Err(StoreError::Network(format!(
                "{} listing unavailable",
                entity_type.collection()
            )));
        }
        Ok(self.lock_roster()?.records(entity_type).to_vec())
    }
}

impl Updater for MemoryStore {
    fn apply(
        &self,
        entity_type: EntityType,
        id: &str,
        fields: &NormalizedFields,
    ) -> Result<(), StoreError> {
        if let Ok(mut attempts) = self.attempts.lock() {
            attempts.push((entity_type, id.to_string()));
        }
        if let Some(err) = self.failing_updates.get(id) {
            return Err(err.clone());
        }
        self.lock_roster()?.merge(entity_type, id, fields)?;
        if let Ok(mut applied) = self.applied.lock() {
            applied.push((entity_type, id.to_string()));
        }
        Ok(())
    }
}

impl Preflight for MemoryStore {
    fn is_reachable(&self) -> bool {
        self.reachable
    }

    fn current_actor(&self) -> Result<Option<Actor>, StoreError> {
        Ok(self.lock_roster()?.actor.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DOC: &str = r#"{
        "actor": {"name": "Admin", "role": "admin"},
        "students": [{"id": "s1", "name": "Ann "}],
        "teachers": []
    }"#;

    #[test]
    fn parse_roster_document() {
        let roster = Roster::from_json(DOC).unwrap();
        assert_eq!(roster.actor.as_ref().unwrap().role, "admin");
        assert_eq!(roster.records(EntityType::Student).len(), 1);
        assert!(roster.records(EntityType::Teacher).is_empty());
    }

    #[test]
    fn missing_collections_default_to_empty() {
        let roster = Roster::from_json("{}").unwrap();
        assert!(roster.actor.is_none());
        assert!(roster.students.is_empty());
    }

    #[test]
    fn apply_merges_fields() {
        let store = MemoryStore::from_json(DOC).unwrap();
        let mut fields = NormalizedFields::new();
        fields.insert("name".into(), json!("Ann"));
        store.apply(EntityType::Student, "s1", &fields).unwrap();
        let roster = store.snapshot();
        assert_eq!(roster.students[0].get_str("name"), Some("Ann"));
        assert_eq!(store.applied(), vec![(EntityType::Student, "s1".to_string())]);
    }

    #[test]
    fn apply_unknown_id_is_not_found() {
        let store = MemoryStore::from_json(DOC).unwrap();
        let err = store
            .apply(EntityType::Student, "nope", &NormalizedFields::new())
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound { id: "nope".into() });
    }

    #[test]
    fn injected_failures() {
        let store = MemoryStore::from_json(DOC)
            .unwrap()
            .fail_fetch(EntityType::Teacher)
            .fail_update("s1", StoreError::Rejected("locked".into()));
        assert!(store.fetch_all(EntityType::Teacher).is_err());
        assert_eq!(store.fetch_calls(), 1);
        assert!(store.apply(EntityType::Student, "s1", &NormalizedFields::new()).is_err());
        assert!(store.applied().is_empty());
        assert_eq!(store.attempts(), vec![(EntityType::Student, "s1".to_string())]);
    }
}
