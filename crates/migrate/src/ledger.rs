use crate::model::ErrorEntry;

/// Append-only list of failures for one run. Entries are never edited or
/// removed once pushed.
#[derive(Debug, Default)]
pub struct ErrorLedger {
    entries: Vec<ErrorEntry>,
}

impl ErrorLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: ErrorEntry) {
        self.entries.push(entry);
    }

    /// Move every entry of `other` to the end of this ledger, keeping order.
    pub fn absorb(&mut self, other: ErrorLedger) {
        self.entries.extend(other.entries);
    }

    pub fn entries(&self) -> &[ErrorEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<ErrorEntry> {
        self.entries
    }
}
