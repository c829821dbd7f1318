//! Endpoint Registry - signed endpoint announcements for network members.
//!
//! Members of a provider network, identified by a roster index and an
//! Ed25519 identity, announce the URL their service is reachable at, mark it
//! down again, and callers ask which members currently have a live endpoint.
//! - Requests are checked against the membership roster before the signature
//! - Records are keyed by identity with an index lookup, last write wins
//! - Every write is committed durably before it is acknowledged

pub mod api;
pub mod config;
pub mod error;
pub mod membership;
pub mod registry;
pub mod signature;
pub mod store;

pub use config::Config;
pub use error::{RegistryError, StorageError, ValidationError};
pub use membership::{Member, MembershipOracle, NetworkId, Roster, SnapshotOracle};
pub use registry::{EndpointRequest, RegistryService};
pub use signature::{Ed25519Verifier, SignatureVerifier};
pub use store::{EndpointRecord, EndpointStore, Store};
