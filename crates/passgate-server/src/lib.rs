//! Passgate Server
//!
//! HTTP front end for the gating engine. The forum host calls it to decide
//! account creation and posting, and administrators use it to manage score
//! requirements.

#![warn(missing_docs)]

pub mod auth;
pub mod config;
pub mod handlers;

use auth::AdminAuth;
use config::ServerConfig;
use handlers::{create_router, AppState};
use passgate_gatekeeper::GatingEngine;
use passgate_provider::{PassportClient, ProviderError};
use passgate_store::{SqliteStore, StoreError};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Server error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Database could not be opened
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Scorer client could not be built
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Server binding error
    #[error("Failed to bind server: {0}")]
    Bind(#[from] std::io::Error),

    /// Server error
    #[error("Server error: {0}")]
    Server(String),
}

/// Build application state from configuration
///
/// Opens the database and constructs the scorer client, without binding.
pub fn build_state(config: &ServerConfig) -> Result<AppState<PassportClient>, ServerError> {
    config.validate()?;

    let provider = PassportClient::with_timeout(
        &config.provider.endpoint,
        &config.provider.api_key,
        config.gating.provider_timeout(),
    )?;
    let store = SqliteStore::new(&config.database_path)?;
    let engine = GatingEngine::new(
        config.gating.clone(),
        config.bypass_window(),
        provider,
        store,
    );

    Ok(AppState {
        engine: Arc::new(engine),
        auth: Arc::new(AdminAuth::new(&config.jwt_secret, config.token_expiry_secs)),
        score_max_age_secs: config.score_max_age_secs,
    })
}

/// Start the HTTP server
///
/// Opens the store, builds the engine and serves until the listener fails.
pub async fn start_server(config: ServerConfig) -> Result<(), ServerError> {
    info!("Starting Passgate server");
    info!("Bind address: {}", config.bind_addr());
    info!("Database: {}", config.database_path);
    info!(
        "Gating enabled: {} (scorer {:?})",
        config.gating.enabled, config.gating.scorer_id
    );

    let state = build_state(&config)?;
    match state.engine.bypass().ends_at() {
        Some(ends_at) => info!("Bypass window ends at {}", ends_at),
        None => info!("No bypass window configured"),
    }

    let app = create_router(state);

    let listener = TcpListener::bind(&config.bind_addr()).await?;
    info!("Server listening on {}", config.bind_addr());

    axum::serve(listener, app)
        .await
        .map_err(|e| ServerError::Server(e.to_string()))?;

    Ok(())
}
