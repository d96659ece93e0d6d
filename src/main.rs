use sip_registry::config::{Config, StoreBackend};
use sip_registry::domain::EntityStore;
use sip_registry::infrastructure::persistence::MemoryEntityStore;
use sip_registry::interface::api::{build_router, init_metrics, AppState};
use sip_registry::SipService;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "postgres")]
use sip_registry::infrastructure::persistence::{
    create_pool, run_migrations, DatabaseConfig, PgEntityStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref())?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting SIP registry");
    info!("Store backend: {:?}", config.store.backend);

    let store = open_store(&config).await;
    if store.is_none() {
        warn!("No entity store available; registry operations will report not ready");
    }

    let sip_service =
        SipService::new(store).with_request_timeout(config.store.request_timeout());

    // Initialize metrics exporter
    info!("Initializing Prometheus metrics exporter");
    let prometheus_handle = init_metrics()?;

    let app = build_router(AppState { sip_service }, prometheus_handle);
    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    info!("REST API server listening on {}", config.bind_address());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down...");
    Ok(())
}

/// Open the configured store. A store that cannot be reached leaves the
/// service running without one.
async fn open_store(config: &Config) -> Option<Arc<dyn EntityStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory entity store");
            Some(Arc::new(MemoryEntityStore::new()))
        }
        #[cfg(feature = "postgres")]
        StoreBackend::Postgres => {
            let db_config = DatabaseConfig::from(&config.database);
            let pool = match create_pool(&db_config).await {
                Ok(pool) => pool,
                Err(e) => {
                    error!("Failed to connect to database: {}", e);
                    return None;
                }
            };
            if let Err(e) = run_migrations(&pool).await {
                error!("Failed to run database migrations: {}", e);
                return None;
            }
            info!("PostgreSQL entity store initialized");
            Some(Arc::new(PgEntityStore::new(pool)))
        }
        #[cfg(not(feature = "postgres"))]
        StoreBackend::Postgres => {
            error!("PostgreSQL backend requested but the postgres feature is disabled");
            None
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}
