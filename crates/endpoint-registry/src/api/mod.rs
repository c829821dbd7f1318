//! HTTP API for the endpoint registry.

mod handlers;
mod middleware;
mod types;

pub use handlers::*;
pub use middleware::{rate_limit_middleware, RateLimitState};
pub use types::*;

use crate::registry::RegistryService;
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub registry: RegistryService,
}

impl AppState {
    pub fn new(registry: RegistryService) -> Self {
        Self { registry }
    }
}

/// Create the API router with default rate limiting.
pub fn create_router(state: AppState) -> Router {
    create_router_with_rate_limit(state, RateLimitState::new(600))
}

/// Create the API router with custom rate limiting.
pub fn create_router_with_rate_limit(state: AppState, rate_limit: RateLimitState) -> Router {
    Router::new()
        .route("/register-endpoint", post(handlers::register_endpoint))
        .route("/down-endpoint", post(handlers::down_endpoint))
        .route("/healthy-endpoints", post(handlers::healthy_endpoints))
        .route("/endpoints", get(handlers::list_endpoints))
        .route("/endpoints/:index", get(handlers::get_endpoint))
        .layer(axum_middleware::from_fn_with_state(
            rate_limit,
            rate_limit_middleware,
        ))
        // Health check (added after the rate limit layer, so not limited)
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
