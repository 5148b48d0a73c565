//! Gatekeeper access gateway
//!
//! Subscribes to card and PIN reader topics, decides each event against the
//! credential store and publishes the decision to the door. Serves the admin
//! API on the same store.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GATEKEEPER_BUS_URL` | `redis://127.0.0.1:6379` | Redis URL |
//! | `GATEKEEPER_BUS_PREFIX` | `gatekeeper` | Redis channel namespace |
//! | `GATEKEEPER_DATABASE_URL` | - | Store URL, `mysql://` or `sqlite:` (required) |
//! | `GATEKEEPER_DB_MAX_CONNECTIONS` | `5` | Store pool size |
//! | `GATEKEEPER_CARD_TOPIC` | `card_input` | Card tap topic |
//! | `GATEKEEPER_PIN_TOPIC` | `code_input` | PIN entry topic |
//! | `GATEKEEPER_GRANTED_TOPIC_PREFIX` | `access_granted/` | Granted decision topic prefix |
//! | `GATEKEEPER_DENIED_TOPIC_PREFIX` | `access_denied/` | Denied decision topic prefix |
//! | `GATEKEEPER_DOOR_TOPIC_BASE` | `doors` | Per-door topic base, empty disables |
//! | `GATEKEEPER_ADMIN_ADDR` | `127.0.0.1:8080` | Admin API address, empty or `off` disables |
//! | `GATEKEEPER_QUEUE_CAPACITY` | `64` | Inbound queue capacity |
//! | `GATEKEEPER_INIT_SCHEMA` | `false` | Create missing tables at startup |
//! | `RUST_LOG` | `info` | Log level |

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use gatekeeper_auth::{Argon2Verifier, HashVerifier};
use gatekeeper_bus::{MessageBus, RedisMessageBus};
use gatekeeper_gateway::{AccessPipeline, DecisionPublisher, GatewayConfig, IngestionLoop};
use gatekeeper_store::{CredentialStore, SqlCredentialStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Gatekeeper access gateway");

    let config = GatewayConfig::from_env()?;
    config.validate()?;
    info!(?config, "Configuration loaded");

    // Credential store
    let store = SqlCredentialStore::connect(&config.database_url, config.db_max_connections)
        .await
        .context("failed to connect to credential store")?;
    if config.init_schema {
        store.init_schema().await.context("failed to create schema")?;
    }
    let store: Arc<dyn CredentialStore> = Arc::new(store);

    // Message bus
    let bus = RedisMessageBus::new(&config.bus_url, &config.bus_prefix)
        .await
        .context("failed to connect to message bus")?;
    let bus: Arc<dyn MessageBus> = Arc::new(bus);
    info!(bus_url = %config.bus_url, "Message bus connected");

    let verifier: Arc<dyn HashVerifier> = Arc::new(Argon2Verifier::new());
    let publisher = DecisionPublisher::from_config(bus.clone(), &config);
    let pipeline = AccessPipeline::new(store.clone(), verifier, publisher);

    let ingestion = IngestionLoop::from_config(bus, pipeline, &config);
    let subscriptions = ingestion
        .subscribe()
        .await
        .context("failed to subscribe to inbound topics")?;

    // Setup shutdown signal
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Admin API
    let admin_handle = match config.admin_addr {
        Some(addr) => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind admin API on {}", addr))?;
            let mut shutdown_rx = shutdown_tx.subscribe();
            Some(tokio::spawn(gatekeeper_admin::serve(listener, store, async move {
                let _ = shutdown_rx.recv().await;
            })))
        }
        None => {
            info!("Admin API disabled");
            None
        }
    };

    info!("Press Ctrl+C to shutdown");
    let ingestion_shutdown = {
        let mut shutdown_rx = shutdown_tx.subscribe();
        async move {
            let _ = shutdown_rx.recv().await;
        }
    };
    let mut ingestion_handle = tokio::spawn(ingestion.run(subscriptions, ingestion_shutdown));

    let stats = tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received...");
            let _ = shutdown_tx.send(());
            ingestion_handle.await
        }
        joined = &mut ingestion_handle => {
            error!("Inbound subscriptions closed, shutting down");
            let _ = shutdown_tx.send(());
            joined
        }
    }
    .context("ingestion task failed")?;
    if let Some(handle) = admin_handle {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Admin API stopped with an error"),
            Err(e) => error!(error = %e, "Admin API task failed"),
        }
    }

    info!(received = stats.received, "Gatekeeper shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
