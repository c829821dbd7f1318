//! Membership oracle adapter.
//!
//! The registry never owns the roster. It reads whatever snapshot is current
//! and a background refresher swaps in new snapshots from a [`RosterSource`].

use async_trait::async_trait;
use membership_client::{MemberInfo, MembershipClient, MembershipError, RosterResponse};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Network identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(pub u16);

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A roster entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub index: u32,
    pub identity: String,
}

/// Validated, index-ordered roster snapshot for one network.
#[derive(Debug, Clone)]
pub struct Roster {
    network: NetworkId,
    members: Vec<Member>,
}

impl Roster {
    /// Build a roster, requiring indices to cover exactly `0..members.len()`.
    pub fn new(network: NetworkId, mut members: Vec<Member>) -> Result<Self, MembershipError> {
        members.sort_by_key(|m| m.index);

        for (position, member) in members.iter().enumerate() {
            if member.index as usize != position {
                return Err(MembershipError::InvalidRoster(format!(
                    "expected index {} but found {} (duplicate or gap)",
                    position, member.index
                )));
            }
            if member.identity.is_empty() {
                return Err(MembershipError::InvalidRoster(format!(
                    "member {} has an empty identity",
                    member.index
                )));
            }
        }

        Ok(Self { network, members })
    }

    /// Empty roster; every index is out of range.
    pub fn empty(network: NetworkId) -> Self {
        Self {
            network,
            members: Vec::new(),
        }
    }

    pub fn network(&self) -> NetworkId {
        self.network
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn member_at(&self, index: u32) -> Option<&Member> {
        self.members.get(index as usize)
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }
}

impl TryFrom<RosterResponse> for Roster {
    type Error = MembershipError;

    fn try_from(response: RosterResponse) -> Result<Self, Self::Error> {
        let members = response
            .members
            .into_iter()
            .map(|MemberInfo { index, identity }| Member { index, identity })
            .collect();
        Roster::new(NetworkId(response.network), members)
    }
}

/// Read-only view of the network roster.
#[async_trait]
pub trait MembershipOracle: Send + Sync {
    /// Current snapshot for `network`, if one has been loaded.
    async fn snapshot(&self, network: NetworkId) -> Option<Arc<Roster>>;

    /// Ordered members of `network`; empty when no snapshot is loaded.
    async fn resolve(&self, network: NetworkId) -> Vec<Member> {
        self.snapshot(network)
            .await
            .map(|roster| roster.members().to_vec())
            .unwrap_or_default()
    }

    async fn member_at(&self, network: NetworkId, index: u32) -> Option<Member> {
        self.snapshot(network)
            .await
            .and_then(|roster| roster.member_at(index).cloned())
    }
}

/// Oracle backed by in-memory snapshots replaced wholesale on refresh.
#[derive(Debug, Default)]
pub struct SnapshotOracle {
    snapshots: RwLock<HashMap<NetworkId, Arc<Roster>>>,
}

impl SnapshotOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Oracle preloaded with one roster.
    pub fn with_roster(roster: Roster) -> Self {
        let mut snapshots = HashMap::new();
        snapshots.insert(roster.network(), Arc::new(roster));
        Self {
            snapshots: RwLock::new(snapshots),
        }
    }

    /// Swap in a new snapshot for the roster's network.
    pub async fn replace(&self, roster: Roster) {
        let network = roster.network();
        let count = roster.member_count();
        self.snapshots.write().await.insert(network, Arc::new(roster));
        debug!(%network, members = count, "Roster snapshot replaced");
    }
}

#[async_trait]
impl MembershipOracle for SnapshotOracle {
    async fn snapshot(&self, network: NetworkId) -> Option<Arc<Roster>> {
        self.snapshots.read().await.get(&network).cloned()
    }
}

/// Somewhere a roster snapshot can be fetched from.
#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn fetch(&self, network: NetworkId) -> Result<Roster, MembershipError>;
}

#[async_trait]
impl RosterSource for MembershipClient {
    async fn fetch(&self, network: NetworkId) -> Result<Roster, MembershipError> {
        self.fetch_members(network.0).await?.try_into()
    }
}

/// Roster read from a JSON snapshot file in the [`RosterResponse`] format.
#[derive(Debug, Clone)]
pub struct FileRosterSource {
    path: PathBuf,
}

impl FileRosterSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RosterSource for FileRosterSource {
    async fn fetch(&self, network: NetworkId) -> Result<Roster, MembershipError> {
        let data = tokio::fs::read(&self.path).await.map_err(|e| {
            MembershipError::Api(format!("Failed to read {:?}: {}", self.path, e))
        })?;
        let response: RosterResponse = serde_json::from_slice(&data)?;

        if response.network != network.0 {
            return Err(MembershipError::InvalidRoster(format!(
                "snapshot file is for network {} but {} was requested",
                response.network, network
            )));
        }

        response.try_into()
    }
}

/// Periodically pulls a roster from a source into a [`SnapshotOracle`].
pub struct RosterRefresher {
    source: Arc<dyn RosterSource>,
    oracle: Arc<SnapshotOracle>,
    network: NetworkId,
    interval: Duration,
}

impl RosterRefresher {
    pub fn new(
        source: Arc<dyn RosterSource>,
        oracle: Arc<SnapshotOracle>,
        network: NetworkId,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            oracle,
            network,
            interval,
        }
    }

    /// Fetch once and replace the snapshot. On failure the previous
    /// snapshot stays in place.
    pub async fn refresh_once(&self) -> Result<usize, MembershipError> {
        let roster = self.source.fetch(self.network).await?;
        let count = roster.member_count();
        self.oracle.replace(roster).await;
        Ok(count)
    }

    /// Run the refresher as a background task.
    ///
    /// This will run indefinitely, sleeping between refreshes.
    pub async fn run(&self) {
        info!(
            "Starting roster refresher for network {}, interval: {:?}",
            self.network, self.interval
        );

        loop {
            tokio::time::sleep(self.interval).await;

            match self.refresh_once().await {
                Ok(count) => debug!("Roster refreshed: {} members", count),
                Err(e) => warn!("Roster refresh failed, keeping previous snapshot: {}", e),
            }
        }
    }
}

/// Spawn the roster refresher as a background task.
pub fn spawn_refresher(refresher: RosterRefresher) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        refresher.run().await;
    })
}
