//! Endpoint store: identity-keyed endpoint records with durable commits.

mod persistent;
mod state;

pub use persistent::Store;
pub use state::{StoreState, SCHEMA_VERSION};

use crate::error::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A member's announced endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRecord {
    /// Roster index the identity registered under
    pub index: u32,

    /// Public identity, the deduplication key
    pub identity: String,

    /// Service URL, meaningful only while `alive`
    pub url: String,

    /// Whether the endpoint is currently announced as up
    pub alive: bool,

    /// Time of the last write to this record
    pub updated_at: DateTime<Utc>,

    /// Store-wide write sequence; the highest sequence owns an index
    pub sequence: u64,
}

impl EndpointRecord {
    /// Compare the fields callers observe, ignoring write bookkeeping.
    pub fn same_endpoint(&self, other: &EndpointRecord) -> bool {
        self.index == other.index
            && self.identity == other.identity
            && self.url == other.url
            && self.alive == other.alive
    }
}

/// Storage contract used by the registry service.
#[async_trait]
pub trait EndpointStore: Send + Sync {
    /// Create or overwrite the record for `identity` and mark it alive.
    async fn upsert(&self, identity: &str, index: u32, url: &str) -> Result<(), StorageError>;

    /// Mark the record for `identity` as down. Returns `false` when no
    /// record exists; nothing is created in that case.
    async fn mark_down(&self, identity: &str) -> Result<bool, StorageError>;

    /// Record currently owning `index`.
    async fn get(&self, index: u32) -> Result<Option<EndpointRecord>, StorageError>;

    /// All records ordered by index, then identity.
    async fn list(&self) -> Result<Vec<EndpointRecord>, StorageError>;
}
