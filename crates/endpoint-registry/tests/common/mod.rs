//! Common test utilities for integration tests.

#![allow(dead_code)]

use ed25519_dalek::{Signer, SigningKey};
use endpoint_registry::{
    signature::{encode_identity, signing_message},
    EndpointRequest, EndpointStore, Member, NetworkId, Roster, SnapshotOracle,
};
use std::sync::Arc;

pub const NETWORK: NetworkId = NetworkId(205);

/// A roster member with its signing key.
pub struct TestMember {
    pub index: u32,
    pub key: SigningKey,
    pub identity: String,
}

impl TestMember {
    pub fn new(index: u32) -> Self {
        Self::with_seed(index, index as u8 + 1)
    }

    /// A member at `index` whose key is derived from `seed` instead.
    pub fn with_seed(index: u32, seed: u8) -> Self {
        let key = SigningKey::from_bytes(&[seed; 32]);
        let identity = encode_identity(&key.verifying_key());
        Self {
            index,
            key,
            identity,
        }
    }

    pub fn sign(&self, index: i64, url: &str) -> String {
        let message = signing_message(index, &self.identity, url);
        format!("0x{}", hex::encode(self.key.sign(message.as_bytes()).to_bytes()))
    }

    /// A correctly signed request for this member's own index.
    pub fn request(&self, url: &str) -> EndpointRequest {
        EndpointRequest {
            index: self.index as i64,
            identity: self.identity.clone(),
            url: url.to_string(),
            signature: self.sign(self.index as i64, url),
        }
    }
}

/// Members `0..count` and an oracle holding their roster.
pub fn test_network(count: u32) -> (Vec<TestMember>, Arc<SnapshotOracle>) {
    let members: Vec<TestMember> = (0..count).map(TestMember::new).collect();
    let oracle = Arc::new(SnapshotOracle::with_roster(roster_of(&members)));
    (members, oracle)
}

pub fn roster_of(members: &[TestMember]) -> Roster {
    Roster::new(
        NETWORK,
        members
            .iter()
            .map(|m| Member {
                index: m.index,
                identity: m.identity.clone(),
            })
            .collect(),
    )
    .unwrap()
}

pub async fn alive_urls(store: &dyn EndpointStore) -> Vec<String> {
    store
        .list()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.alive)
        .map(|r| r.url)
        .collect()
}
