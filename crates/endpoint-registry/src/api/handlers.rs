//! HTTP request handlers.

use super::types::{
    DeregisterResponse, EndpointRequest, EndpointsResponse, HealthResponse,
    HealthyEndpointsRequest, RegisterResponse,
};
use super::AppState;
use crate::error::RegistryError;
use crate::store::EndpointRecord;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, RegistryError> {
    let summary = state.registry.summary().await?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        network: state.registry.network().0,
        member_count: summary.member_count,
        endpoint_count: summary.endpoint_count,
        alive_count: summary.alive_count,
    }))
}

/// Register or update a member's endpoint.
pub async fn register_endpoint(
    State(state): State<AppState>,
    payload: Result<Json<EndpointRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, RegistryError> {
    let Json(request) = payload?;
    state.registry.register(request).await?;

    Ok(Json(RegisterResponse {
        status: "ok".to_string(),
        message: "Endpoint registered successfully.".to_string(),
    }))
}

/// Mark a member's endpoint as down.
pub async fn down_endpoint(
    State(state): State<AppState>,
    payload: Result<Json<EndpointRequest>, JsonRejection>,
) -> Result<Json<DeregisterResponse>, RegistryError> {
    let Json(request) = payload?;
    let changed = state.registry.deregister(request).await?;

    let message = if changed {
        "Endpoint marked as down."
    } else {
        "No endpoint registered for this identity; nothing to mark down."
    };

    Ok(Json(DeregisterResponse {
        status: "ok".to_string(),
        changed,
        message: message.to_string(),
    }))
}

/// URLs of the alive endpoints among the requested indices.
pub async fn healthy_endpoints(
    State(state): State<AppState>,
    payload: Result<Json<HealthyEndpointsRequest>, JsonRejection>,
) -> Result<Json<Vec<String>>, RegistryError> {
    let Json(request) = payload?;
    let urls = state.registry.query_healthy(&request.indices).await?;
    Ok(Json(urls))
}

/// List every known endpoint record.
pub async fn list_endpoints(
    State(state): State<AppState>,
) -> Result<Json<EndpointsResponse>, RegistryError> {
    let endpoints = state.registry.endpoints().await?;
    let total = endpoints.len();
    Ok(Json(EndpointsResponse { endpoints, total }))
}

/// Endpoint record for one index.
pub async fn get_endpoint(
    State(state): State<AppState>,
    Path(index): Path<u32>,
) -> Result<Json<EndpointRecord>, RegistryError> {
    state
        .registry
        .endpoint(index)
        .await?
        .map(Json)
        .ok_or(RegistryError::NotFound(index))
}
