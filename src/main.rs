//! uniledger-payments server entry point.
//!
//! Starts the Axum HTTP server with the payment REST endpoints.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use axum::http::StatusCode;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use uniledger_payments::api;
use uniledger_payments::app_state::AppState;
use uniledger_payments::chain::{AlgodClient, ChainClient};
use uniledger_payments::config::{AppConfig, LogFormat};
use uniledger_payments::persistence::{
    InMemoryRepository, PaymentRepository, PostgresRepository,
};
use uniledger_payments::service::PaymentService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting uniledger-payments");

    // Build persistence layer
    let repo = build_repository(&config).await?;

    // Build chain client
    let algod = AlgodClient::new(config.algod_config()).context("invalid algod configuration")?;
    tracing::info!(url = %config.algod_url, "using algod node");
    let chain: Arc<dyn ChainClient> = Arc::new(algod);

    // Build service layer and application state
    let app_state = AppState::new(PaymentService::new(repo, chain));

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout(),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_repository(config: &AppConfig) -> anyhow::Result<Arc<dyn PaymentRepository>> {
    if !config.persistence_enabled {
        tracing::warn!("persistence disabled, using in-memory store");
        return Ok(Arc::new(InMemoryRepository::new()));
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
        .connect(&config.database_url)
        .await
        .context("failed to connect to PostgreSQL")?;
    let repo = PostgresRepository::new(pool);

    if config.run_migrations {
        repo.migrate().await.context("failed to run migrations")?;
        tracing::info!("database migrations applied");
    }

    Ok(Arc::new(repo))
}
