//! Vivid Vision server entry point.
//!
//! Selects the storage backend, builds the shared state, and starts the Axum
//! HTTP server with graceful shutdown. A background sweep worker removes
//! expired bans and sessions and is stopped on shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use vivid_storage::{MemoryBackend, StorageBackend};

use vivid_server::app::build_router;
use vivid_server::config::{ServerConfig, StorageBackendType};
use vivid_server::state::AppState;
use vivid_server::sweep::sweep_worker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    info!(storage = ?storage_label(&config.storage_backend), "Vivid Vision starting");

    let storage = open_storage(&config.storage_backend).await?;
    let state = Arc::new(AppState::build(&config, storage).await?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweep_handle = tokio::spawn(sweep_worker(
        state.bans.clone(),
        state.sessions.clone(),
        shutdown_rx,
        config.sweep_interval_secs,
    ));

    let app = build_router(Arc::clone(&state));

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "Vivid Vision listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_tx))
    .await
    .context("server error")?;

    info!("waiting for background workers to stop");
    let _ = tokio::time::timeout(Duration::from_secs(10), sweep_handle).await;

    info!("Vivid Vision stopped");
    Ok(())
}

fn storage_label(backend: &StorageBackendType) -> &'static str {
    match backend {
        StorageBackendType::Memory => "memory",
        StorageBackendType::Postgres { .. } => "postgres",
    }
}

/// Open the configured storage backend.
async fn open_storage(backend: &StorageBackendType) -> anyhow::Result<Arc<dyn StorageBackend>> {
    match backend {
        StorageBackendType::Memory => {
            info!("using in-memory storage (data will not persist)");
            Ok(Arc::new(MemoryBackend::new()))
        }
        #[cfg(feature = "postgres-backend")]
        StorageBackendType::Postgres { url } => {
            info!(url = %"[redacted]", "using PostgreSQL storage");
            Ok(Arc::new(
                vivid_storage::PostgresBackend::connect(url)
                    .await
                    .context("failed to connect to PostgreSQL storage")?,
            ))
        }
        #[cfg(not(feature = "postgres-backend"))]
        StorageBackendType::Postgres { .. } => {
            anyhow::bail!("PostgreSQL backend requested but feature 'postgres-backend' is not enabled");
        }
    }
}

/// Wait for SIGINT or SIGTERM, then broadcast shutdown.
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sig.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received, stopping server");
    let _ = shutdown_tx.send(true);
}
