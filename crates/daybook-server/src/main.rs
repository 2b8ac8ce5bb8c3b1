//! Daybook binary entry point.

use std::sync::Arc;

use daybook_server::{
    api::{api_router, ApiState},
    config::StorageConfig,
    geo::NullGeoLocator,
    DaybookConfig,
};
use daybook_store::{LogBackend, LogStore, MemoryBackend, MySqlBackend};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "daybook=info,daybook_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting daybook-server");

    let config = DaybookConfig::load()?;
    tracing::info!(
        listen_addr = %config.server.listen_addr,
        partition_days = config.query.partition_days,
        "Configuration loaded"
    );

    let backend: Arc<dyn LogBackend> = match &config.storage {
        StorageConfig::Memory => {
            tracing::warn!("using in-memory storage, records will not survive a restart");
            Arc::new(MemoryBackend::new())
        }
        StorageConfig::Mysql {
            url,
            max_connections,
        } => Arc::new(MySqlBackend::connect(url, *max_connections).await?),
    };

    let state = ApiState {
        store: LogStore::new(backend),
        geo: Arc::new(NullGeoLocator),
        partition_days: config.query.partition_days,
    };

    let listener = tokio::net::TcpListener::bind(config.server.listen_addr).await?;
    tracing::info!(addr = %config.server.listen_addr, "Server starting");
    axum::serve(
        listener,
        api_router(state).into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Create a shutdown signal future for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
