//! boardwarden server entry point.
//!
//! Wires the backup store, caches, object storage and processing paths
//! together and starts the Axum HTTP server.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use boardwarden::api;
use boardwarden::app_state::AppState;
use boardwarden::cache::{AdminCache, MemoryTtlCache, RedisTtlCache, ReplicationGuard, TtlCache};
use boardwarden::config::WardenConfig;
use boardwarden::persistence::postgres::PostgresStore;
use boardwarden::service::{Applier, AttachmentReplicator, Authorizer, Compensator, Dispatcher};
use boardwarden::storage::fs::FsObjectStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = WardenConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting boardwarden");

    // Backup store + board registry share one pool.
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!().run(&pool).await?;
    let store = Arc::new(PostgresStore::new(pool));
    let registry = Arc::clone(&store);

    // Fast cache: Redis when configured, in-process otherwise.
    let cache: Arc<dyn TtlCache> = if config.redis_url.is_empty() {
        tracing::info!("no REDIS_URL configured; using in-process TTL cache");
        Arc::new(MemoryTtlCache::new())
    } else {
        Arc::new(RedisTtlCache::connect(&config.redis_url).await?)
    };

    let replicator = AttachmentReplicator::new(
        Arc::new(FsObjectStore::new(config.attachment_dir.clone())),
        ReplicationGuard::new(Arc::clone(&cache), config.replication_guard_ttl),
    );
    let applier = Applier::new(store, replicator.clone(), config.move_settle_delay);
    let dispatcher = Dispatcher::new(
        registry,
        Authorizer::new(AdminCache::new(cache, config.admin_cache_ttl)),
        applier.clone(),
        Compensator::new(applier, replicator),
        reqwest::Client::new(),
        config.api_base_url.clone(),
        config.api_key.clone(),
    );

    let app_state = AppState {
        dispatcher,
        secret_key: config.secret_key.clone(),
    };

    let app = Router::new()
        .merge(api::build_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
