//! Endpoint Registry - Entry point.

use endpoint_registry::{
    api::{create_router_with_rate_limit, AppState, RateLimitState},
    config::Config,
    membership::{
        spawn_refresher, FileRosterSource, NetworkId, RosterRefresher, RosterSource,
        SnapshotOracle,
    },
    registry::RegistryService,
    signature::Ed25519Verifier,
    store::{EndpointStore, Store},
};
use membership_client::MembershipClient;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config.log.level);

    info!("Starting Endpoint Registry");

    // Initialize storage
    let store: Arc<dyn EndpointStore> = if config.store.persist {
        match Store::open(&config.store.path, config.store.write_timeout).await {
            Ok(s) => Arc::new(s),
            Err(e) => {
                error!("Failed to open endpoint store at {:?}: {}", config.store.path, e);
                std::process::exit(1);
            }
        }
    } else {
        warn!("Persistence disabled, using in-memory storage (data will be lost on restart)");
        Arc::new(Store::memory(config.store.write_timeout))
    };

    // Initialize the roster oracle
    let network = NetworkId(config.membership.network);
    let oracle = Arc::new(SnapshotOracle::new());

    let source: Option<Arc<dyn RosterSource>> = if let Some(url) = &config.membership.source_url
    {
        match MembershipClient::new(url.as_str(), config.membership.request_timeout) {
            Ok(client) => {
                info!("Using roster source at {}", url);
                Some(Arc::new(client) as Arc<dyn RosterSource>)
            }
            Err(e) => {
                error!("Failed to create membership client: {}", e);
                std::process::exit(1);
            }
        }
    } else if let Some(path) = &config.membership.snapshot_path {
        info!("Using roster snapshot file {:?}", path);
        Some(Arc::new(FileRosterSource::new(path)) as Arc<dyn RosterSource>)
    } else {
        warn!("No roster source configured; every request will be rejected as out of range");
        None
    };

    if let Some(source) = source {
        let refresher = RosterRefresher::new(
            source,
            oracle.clone(),
            network,
            config.membership.refresh_interval,
        );

        match refresher.refresh_once().await {
            Ok(count) => info!("Loaded roster for network {} with {} members", network, count),
            Err(e) => {
                error!("Failed to load initial roster: {}", e);
                info!("Starting with empty roster");
            }
        }

        spawn_refresher(refresher);
    }

    // Create application state
    let registry = RegistryService::new(network, oracle, Arc::new(Ed25519Verifier::new()), store);
    let state = AppState::new(registry);

    let rate_limit = RateLimitState::new(config.rate_limit.global_per_minute);
    let app = create_router_with_rate_limit(state, rate_limit);

    // Bind to address
    let addr = match config.server.socket_addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    info!("Listening on {}", addr);

    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    // Run server
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("Shutting down...");
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
