//! Groundlink ingestion binary.
//!
//! Binds the UDP listener, connects the store, and runs the reception
//! loop until SIGINT/SIGTERM.

use std::sync::Arc;

use clap::Parser;
use groundlink_store::PostgresStore;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use groundlink_ingest::{IngestConfig, PacketReceiver, ReceiverSettings};

/// Groundlink telemetry ingestion service.
#[derive(Parser, Debug)]
#[command(name = "groundlink-ingest")]
#[command(about = "Ingest telemetry frames over UDP into Postgres")]
#[command(version)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug,sqlx=info" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    info!("Groundlink ingestion starting");

    let config = IngestConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        info!(error = %e, "Failed to load config, using defaults");
        IngestConfig::default()
    });

    info!(
        bind_address = %config.server.bind_address,
        buffer_size = config.server.buffer_size,
        store_timeout_secs = config.ingest.store_timeout_secs,
        "Configuration loaded"
    );

    // An unreachable store at startup is fatal: the service must not
    // begin accepting frames it cannot persist.
    let store = PostgresStore::connect(&config.database.url, config.database.max_connections)
        .await
        .map_err(|e| {
            error!(error = %e, "Store connection failed");
            anyhow::anyhow!("store connection failed: {e}")
        })?;

    let receiver = PacketReceiver::bind(
        config.server.bind_address,
        ReceiverSettings::from(&config),
        Arc::new(store.clone()),
    )
    .await?;

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        cancel_on_signal.cancel();
    });

    receiver.run(cancel).await;

    store.close().await;
    info!("Groundlink ingestion shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
