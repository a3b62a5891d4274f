//! # dTask API Server
//!
//! Marketplace backend: accounts with wallet-per-role registration, task
//! postings with attachments, and the freelancer application workflow.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p dtask-api
//! ```
//!
//! Set `LOG_FORMAT=json` for JSON log lines.

use dtask_api::{
    app::{build_router, AppState},
    config::{Config, StoreBackend},
};
use dtask_shared::{
    db::{migrations, pool},
    store::{memory::MemoryStore, postgres::PgStore, Store},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dtask_api=debug,dtask_shared=info,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Connects, creating the database and applying migrations as needed
async fn connect_postgres(config: &Config) -> anyhow::Result<PgPool> {
    let database = config
        .database
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for the postgres store"))?;

    migrations::ensure_database_exists(&database.url).await?;

    let db = pool::create_pool(pool::DatabaseConfig {
        url: database.url.clone(),
        max_connections: database.max_connections,
        ..Default::default()
    })
    .await?;

    migrations::run_migrations(&db).await?;
    let applied = migrations::applied_migrations(&db).await?;
    tracing::info!(applied, "Database migrations up to date");

    Ok(db)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received, draining connections...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Read .env before the log filter is built
    dotenvy::dotenv().ok();
    init_tracing();

    tracing::info!("dTask API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    if config.jwt.ephemeral {
        tracing::warn!(
            "JWT_SECRET is not set; using a random secret, tokens will not survive a restart"
        );
    }

    let (store, pg_pool): (Arc<dyn Store>, Option<PgPool>) = match config.store {
        StoreBackend::Postgres => {
            let db = connect_postgres(&config).await?;
            (Arc::new(PgStore::new(db.clone())), Some(db))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on shutdown");
            (Arc::new(MemoryStore::new()), None)
        }
    };

    let bind_address = config.bind_address();
    tracing::info!(store = %config.store, uploads = %config.uploads.dir.display(), "Configuration loaded");

    let app = build_router(AppState::new(store, config));

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(db) = pg_pool {
        pool::close_pool(db).await;
    }

    tracing::info!("Server stopped");
    Ok(())
}
