//! Roster API types.

use serde::{Deserialize, Serialize};

/// A single member entry as published by the roster source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInfo {
    /// Position of the member in the network roster
    pub index: u32,

    /// Base58-encoded public identity
    pub identity: String,
}

/// Roster snapshot for one network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterResponse {
    /// Network identifier the snapshot belongs to
    pub network: u16,

    /// Members in any order
    pub members: Vec<MemberInfo>,

    /// Chain height the snapshot was taken at, if the source reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<u64>,
}
