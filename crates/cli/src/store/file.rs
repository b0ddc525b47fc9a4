//! JSON roster file store.
//!
//! The whole document is loaded on first use and kept in memory. Every
//! successful `apply` rewrites the file through a sibling temp file and a
//! rename, so a crash mid-run never leaves a half-written roster behind.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rollbook_migrate::model::{Actor, NormalizedFields};
use rollbook_migrate::{EntitySource, EntityType, Preflight, Record, Roster, StoreError, Updater};

pub struct FileStore {
    path: PathBuf,
    roster: Mutex<Option<Roster>>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            roster: Mutex::new(None),
        }
    }

    fn with_roster<T>(&self, f: impl FnOnce(&mut Roster) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let mut guard = self
            .roster
            .lock()
            .map_err(|_| StoreError::Io("roster lock poisoned".into()))?;
        if guard.is_none() {
            *guard = Some(load(&self.path)?);
        }
        match guard.as_mut() {
            Some(roster) => f(roster),
            None => Err(StoreError::Io("roster not loaded".into())),
        }
    }
}

fn load(path: &Path) -> Result<Roster, StoreError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| StoreError::Io(format!("{}: {e}", path.display())))?;
    Roster::from_json(&text)
}

fn persist(path: &Path, roster: &Roster) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(roster).map_err(|e| StoreError::Parse(e.to_string()))?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, json).map_err(|e| StoreError::Io(format!("{}: {e}", tmp.display())))?;
    std::fs::rename(&tmp, path).map_err(|e| StoreError::Io(format!("{}: {e}", path.display())))
}

impl EntitySource for FileStore {
    fn fetch_all(&self, entity_type: EntityType) -> Result<Vec<Record>, StoreError> {
        self.with_roster(|roster| Ok(roster.records(entity_type).to_vec()))
    }
}

impl Updater for FileStore {
    fn apply(
        &self,
        entity_type: EntityType,
        id: &str,
        fields: &NormalizedFields,
    ) -> Result<(), StoreError> {
        self.with_roster(|roster| {
            // The cached roster only changes once the file holds the merge.
            let mut next = roster.clone();
            next.merge(entity_type, id, fields)?;
            persist(&self.path, &next)?;
            *roster = next;
            Ok(())
        })
    }
}

impl Preflight for FileStore {
    fn is_reachable(&self) -> bool {
        match self.with_roster(|_| Ok(())) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "roster file unavailable");
                false
            }
        }
    }

    fn current_actor(&self) -> Result<Option<Actor>, StoreError> {
        self.with_roster(|roster| Ok(roster.actor.clone()))
    }
}
