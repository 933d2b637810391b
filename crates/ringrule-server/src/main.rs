//! # ringrule-server
//!
//! HTTP server for the ringrule ringer mode engine.
//!
//! This binary provides:
//! - REST API for rules, location and call inputs, overrides and decisions
//! - OpenAPI documentation via Swagger UI
//! - Structured logging to file and stdout
//!
//! ## Running
//!
//! ```bash
//! # Development
//! cargo run --package ringrule-server
//!
//! # Production: JSON file logs, config from RINGRULE_CONFIG
//! RINGRULE_ENV=production RINGRULE_CONFIG=/etc/ringrule/config.toml ./ringrule-server
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use anyhow::Context;
use ringrule_core::RingruleConfig;
use ringrule_server::api::create_router;
use ringrule_server::logging::{self, LogProfile};
use ringrule_server::state::AppState;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let profile = LogProfile::from_env();
    logging::init(profile)?;

    info!(version = env!("CARGO_PKG_VERSION"), ?profile, "Starting ringrule-server");

    let config_path = RingruleConfig::default_path();
    let config = RingruleConfig::load(config_path.as_deref()).context("failed to load configuration")?;
    info!(
        config = ?config_path,
        timezone = config.system.timezone.name(),
        default_mode = %config.engine.default_mode,
        "Configuration loaded"
    );

    let addr = config.system.listen_addr;
    let state = AppState::new(config, config_path)
        .context("failed to restore engine state")?
        .into_shared();
    let app = create_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
    }
}
