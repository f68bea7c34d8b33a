//! CRUD Server - Main entry point

use anyhow::Result;
use crud_common::logging::{init_logging, LogConfig};
use std::{net::SocketAddr, time::Duration};
use tokio::signal;
use tracing::info;

use crud_server::{
    app::{self, AppState},
    config::Config,
    store::DataSource,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Environment settings take precedence over these defaults
    let log_config = match LogConfig::from_env() {
        Ok(config) => config,
        Err(_) => LogConfig::builder()
            .filter_directives("crud_server=debug,tower_http=debug,mongodb=info")
            .build(),
    };

    // Held until exit so buffered file logs are flushed
    let _log_guard = init_logging(&log_config)?;

    info!("Starting CRUD server");

    let config = Config::load()?;
    info!(
        environment = ?config.app.environment,
        "Configuration loaded - server will bind to {}://{}:{}",
        config.app.protocol,
        config.app.host,
        config.app.port
    );

    let data_source = DataSource::from_config(&config).await?;
    info!(backend = data_source.backend_name(), "Document store ready");

    let shutdown_timeout_secs = config.app.shutdown_timeout_secs;
    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port).parse()?;

    let state = AppState::new(config, data_source);
    state.prime_crypto_keys().await;

    let app = app::create_router(state);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    app::serve(
        listener,
        app,
        shutdown_signal(),
        Duration::from_secs(shutdown_timeout_secs),
    )
    .await?;

    info!("Server shut down gracefully");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
