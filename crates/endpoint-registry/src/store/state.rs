//! In-memory endpoint table and its index side index.

use super::EndpointRecord;
use crate::error::StorageError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// On-disk schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Result of applying a mark-down to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MarkDown {
    Missing,
    AlreadyDown,
    Changed,
}

/// Endpoint records keyed by identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreState {
    version: u32,
    records: HashMap<String, EndpointRecord>,
    /// Index to owning identity, rebuilt from `sequence` on load
    #[serde(skip)]
    by_index: HashMap<u32, String>,
    #[serde(skip)]
    next_sequence: u64,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION,
            records: HashMap::new(),
            by_index: HashMap::new(),
            next_sequence: 1,
        }
    }
}

impl StoreState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a persisted snapshot.
    pub fn from_slice(data: &[u8]) -> Result<Self, StorageError> {
        let mut state: StoreState = serde_json::from_slice(data)
            .map_err(|e| StorageError::Schema(format!("unreadable snapshot: {}", e)))?;

        if state.version != SCHEMA_VERSION {
            return Err(StorageError::Schema(format!(
                "snapshot version {} does not match expected version {}",
                state.version, SCHEMA_VERSION
            )));
        }

        if let Some((key, record)) = state.records.iter().find(|(k, r)| **k != r.identity) {
            return Err(StorageError::Schema(format!(
                "record keyed by {} carries identity {}",
                key, record.identity
            )));
        }

        state.rebuild_index();
        Ok(state)
    }

    fn rebuild_index(&mut self) {
        let mut owners: HashMap<u32, &EndpointRecord> = HashMap::new();
        for record in self.records.values() {
            let owner = owners.entry(record.index).or_insert(record);
            if record.sequence > owner.sequence {
                *owner = record;
            }
        }

        self.by_index = owners
            .into_iter()
            .map(|(index, record)| (index, record.identity.clone()))
            .collect();
        self.next_sequence = self
            .records
            .values()
            .map(|r| r.sequence)
            .max()
            .unwrap_or(0)
            + 1;
    }

    /// Hand `index` to the latest remaining claimant, the same choice
    /// `rebuild_index` makes on load.
    fn reassign(&mut self, index: u32) {
        let owner = self
            .records
            .values()
            .filter(|r| r.index == index)
            .max_by_key(|r| r.sequence)
            .map(|r| r.identity.clone());

        match owner {
            Some(identity) => {
                self.by_index.insert(index, identity);
            }
            None => {
                self.by_index.remove(&index);
            }
        }
    }

    /// Create or overwrite a record as alive. Returns `false` if the table
    /// already held exactly this state.
    pub(crate) fn upsert(&mut self, identity: &str, index: u32, url: &str) -> bool {
        let previous_index = self.records.get(identity).map(|r| r.index);

        let unchanged = self
            .records
            .get(identity)
            .map(|r| r.index == index && r.url == url && r.alive)
            .unwrap_or(false)
            && self.by_index.get(&index).map(String::as_str) == Some(identity);
        if unchanged {
            return false;
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.records.insert(
            identity.to_string(),
            EndpointRecord {
                index,
                identity: identity.to_string(),
                url: url.to_string(),
                alive: true,
                updated_at: Utc::now(),
                sequence,
            },
        );
        self.by_index.insert(index, identity.to_string());

        if let Some(old) = previous_index.filter(|old| *old != index) {
            self.reassign(old);
        }
        true
    }

    pub(crate) fn mark_down(&mut self, identity: &str) -> MarkDown {
        match self.records.get_mut(identity) {
            None => MarkDown::Missing,
            Some(record) if !record.alive => MarkDown::AlreadyDown,
            Some(record) => {
                // Sequence is left alone: liveness does not claim an index
                record.alive = false;
                record.updated_at = Utc::now();
                MarkDown::Changed
            }
        }
    }

    /// Record owning `index`.
    pub fn get_by_index(&self, index: u32) -> Option<&EndpointRecord> {
        self.by_index
            .get(&index)
            .and_then(|identity| self.records.get(identity))
    }

    /// Record for `identity`.
    pub fn get(&self, identity: &str) -> Option<&EndpointRecord> {
        self.records.get(identity)
    }

    /// All records ordered by index, then identity.
    pub fn list(&self) -> Vec<EndpointRecord> {
        let mut records: Vec<EndpointRecord> = self.records.values().cloned().collect();
        records.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.identity.cmp(&b.identity)));
        records
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn count_alive(&self) -> usize {
        self.records.values().filter(|r| r.alive).count()
    }
}
