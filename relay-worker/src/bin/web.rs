//! MailRelay Web Server - submission intake.
//!
//! This binary provides a thin web server that:
//! - Validates outbound email submissions
//! - Records each one in the durable store
//! - Enqueues it on the pending list
//! - Returns the assigned id immediately
//!
//! Delivery happens in the sender and finalizer workers.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mailrelay::util::shutdown_signal;
use mailrelay::web::router;
use mailrelay::{AppState, Config, Pipeline, RedisQueueStore, SqliteRecordStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        max_field_length = config.max_field_length,
        pending = %config.queues.pending,
        "config_loaded"
    );

    let store = RedisQueueStore::connect(&config.redis_url)
        .await
        .context("Failed to connect to Redis")?;
    let pipeline = Pipeline::new(Arc::new(store), config.queues.clone());

    let records = SqliteRecordStore::connect(&config.database_url)
        .await
        .context("Failed to open record store")?;

    // Create application state
    let port = config.port;
    let state = AppState::new(config, pipeline, Arc::new(records));
    let app = router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            info!("web_server_shutting_down");
        })
        .await
        .context("Server error")?;

    info!("web_server_shutdown_complete");

    Ok(())
}
