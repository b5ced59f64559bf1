//! Fraud Scoring Service
//!
//! Validates transaction payloads and scores them against a versioned
//! logistic-regression model fetched from object storage.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   FRAUD SCORING SERVICE                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  POST /validate ──► Validation Gate                         │
//! │                                                             │
//! │  POST /score ─────► Validation Gate ──► Scoring Engine      │
//! │                                              │              │
//! │                                              ▼              │
//! │                                     Model Parameter Cache   │
//! │                                              │ (cold only)  │
//! └──────────────────────────────────────────────┼──────────────┘
//!                                                ▼
//!                                         Object Storage
//! ```

mod config;
mod error;
mod handlers;
mod logic;
mod models;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use std::net::SocketAddr;
use std::sync::Arc;

use logic::cache::ModelCache;
use logic::store::{ArtifactStore, HttpObjectStore, LocalFileStore, ObjectLocation};
use logic::validation::TransactionSchema;

pub use error::{AppError, AppResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    // Initialize logging
    init_tracing(&config);

    tracing::info!("Fraud Scoring Service starting ({})...", config.environment);

    let schema = match &config.transaction_schema_path {
        Some(path) => {
            tracing::info!("Transaction schema: {}", path.display());
            TransactionSchema::from_file(path)?
        }
        None => TransactionSchema::default(),
    };

    // Model cache, one per process
    let (store, location) = artifact_source(&config)?;
    tracing::info!("Model artifact: {} ({} store)", location, store.name());
    let cache = ModelCache::new(store, location).with_retry_backoff(config.model_retry_backoff);

    if config.model_preload {
        match cache.get_active_artifact().await {
            Ok(entry) => tracing::info!("Model {} preloaded", entry.version()),
            Err(e) => tracing::warn!("Model preload failed, first request will retry: {}", e),
        }
    }

    // Build application state
    let state = AppState {
        cache: Arc::new(cache),
        schema: Arc::new(schema),
        config: config.clone(),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ModelCache>,
    pub schema: Arc<TransactionSchema>,
    pub config: config::Config,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(handlers::health::check))
        .route("/validate", post(handlers::transactions::validate))
        .route("/score", post(handlers::transactions::score))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http());

    // Browser access is only opened up outside production
    let router = if state.config.is_production() {
        router
    } else {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
    };

    router.with_state(state)
}

fn init_tracing(config: &config::Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fraud_scoring=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if config.log_format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Object store + location for the configured artifact
fn artifact_source(config: &config::Config) -> anyhow::Result<(Arc<dyn ArtifactStore>, ObjectLocation)> {
    match config.remote_artifact() {
        Some(location) => {
            let store: Arc<dyn ArtifactStore> = Arc::new(HttpObjectStore::new(
                config.model_store_endpoint.clone(),
                config.model_fetch_timeout,
            )?);
            Ok((store, location))
        }
        None => {
            let location = ObjectLocation::new("", config.model_local_path.to_string_lossy());
            let store: Arc<dyn ArtifactStore> = Arc::new(LocalFileStore::new("."));
            Ok((store, location))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
