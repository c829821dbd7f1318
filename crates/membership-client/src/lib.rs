//! Client for the external network membership roster.
//!
//! The roster maps member indices to public identities. The registry treats
//! it as a read-only oracle and polls it through this client.

mod client;
mod error;
mod types;

pub use client::MembershipClient;
pub use error::MembershipError;
pub use types::*;
