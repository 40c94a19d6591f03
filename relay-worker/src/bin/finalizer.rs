//! MailRelay Finalizer - marks delivered messages processed.
//!
//! This binary:
//! 1. Claims delivered messages from the done list
//! 2. Marks their durable records processed with the delivery time
//! 3. Retires them from the queue
//!
//! A record update that fails leaves the entry on the done list for retry.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mailrelay::util::shutdown_signal;
use mailrelay::{Config, Finalizer, Pipeline, PollLoop, RedisQueueStore, SqliteRecordStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("finalizer_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        done = %config.queues.done,
        idle_ms = config.finalize_intervals.idle.as_millis() as u64,
        active_ms = config.finalize_intervals.active.as_millis() as u64,
        "config_loaded"
    );

    let store = RedisQueueStore::connect(&config.redis_url)
        .await
        .context("Failed to connect to Redis")?;
    let pipeline = Pipeline::new(Arc::new(store), config.queues.clone());

    let records = SqliteRecordStore::connect(&config.database_url)
        .await
        .context("Failed to open record store")?;

    info!("finalizer_ready");

    PollLoop::new(Finalizer::new(pipeline, Arc::new(records)), config.finalize_intervals)
        .run_until(shutdown_signal())
        .await;

    info!("finalizer_shutdown_complete");
    Ok(())
}
