//! API request and response types.

use crate::store::EndpointRecord;
use serde::{Deserialize, Serialize};

pub use crate::registry::EndpointRequest;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub network: u16,
    pub member_count: usize,
    pub endpoint_count: usize,
    pub alive_count: usize,
}

/// Response after registering an endpoint.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub status: String,
    pub message: String,
}

/// Response after marking an endpoint down.
#[derive(Debug, Serialize)]
pub struct DeregisterResponse {
    pub status: String,
    /// Whether a record existed to mark down
    pub changed: bool,
    pub message: String,
}

/// Request for the alive endpoints among a set of indices.
#[derive(Debug, Deserialize)]
pub struct HealthyEndpointsRequest {
    pub indices: Vec<i64>,
}

/// List of all known endpoints.
#[derive(Debug, Serialize)]
pub struct EndpointsResponse {
    pub endpoints: Vec<EndpointRecord>,
    pub total: usize,
}
