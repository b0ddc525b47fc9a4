use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Entity types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Student,
    Teacher,
}

impl EntityType {
    pub const ALL: [EntityType; 2] = [EntityType::Student, EntityType::Teacher];

    /// Collection name on the remote store.
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Student => "students",
            Self::Teacher => "teachers",
        }
    }

    /// Label used in the error table's `Type` column.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Student => "Student",
            Self::Teacher => "Teacher",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Student => write!(f, "student"),
            Self::Teacher => write!(f, "teacher"),
        }
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "student" | "students" => Ok(Self::Student),
            "teacher" | "teachers" => Ok(Self::Teacher),
            other => Err(format!("unknown entity type '{other}' (expected student or teacher)")),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One entity instance as fetched from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style field setter, mostly for tests and fixtures.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Trimmed `name`, falling back to the id when the name is blank.
    pub fn display_name(&self) -> String {
        match self.get_str("name").map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.id.clone(),
        }
    }
}

/// Full canonical field set sent to the updater.
pub type NormalizedFields = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub issues: Vec<String>,
}

impl ValidationResult {
    pub fn from_issues(issues: Vec<String>) -> Self {
        Self {
            is_valid: issues.is_empty(),
            issues,
        }
    }
}

/// Identity the run is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub name: String,
    pub role: String,
}

// ---------------------------------------------------------------------------
// Statistics + ledger entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStatistics {
    pub total: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl RunStatistics {
    pub fn fetched(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Records that reached a terminal state.
    pub fn processed(&self) -> usize {
        self.updated + self.skipped + self.errors
    }

    pub fn is_balanced(&self) -> bool {
        self.total == self.processed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    pub entity_type: EntityType,
    pub id: String,
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

impl LogEntry {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Run output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub status: RunStatus,
    pub actor: Actor,
    pub stats: BTreeMap<EntityType, RunStatistics>,
    pub errors: Vec<ErrorEntry>,
    pub log: Vec<LogEntry>,
}

/// The caller-facing part of a run: counts and failures, no log.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub stats: BTreeMap<EntityType, RunStatistics>,
    pub errors: Vec<ErrorEntry>,
}

impl RunResult {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            stats: self.stats.clone(),
            errors: self.errors.clone(),
        }
    }

    pub fn total_errors(&self) -> usize {
        self.stats.values().map(|s| s.errors).sum()
    }

    pub fn total_updated(&self) -> usize {
        self.stats.values().map(|s| s.updated).sum()
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == RunStatus::Cancelled
    }
}
