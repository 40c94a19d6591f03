//! MailRelay Sender - delivers pending messages through the mail API.
//!
//! This worker claims messages from the pending list one at a time, builds
//! their envelopes, sends them, and forwards delivered messages to the done
//! list for the finalizer.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mailrelay::util::shutdown_signal;
use mailrelay::{Config, DeliveryWorker, MailApiSender, Pipeline, PollLoop, RedisQueueStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("sender_starting");

    // Load configuration from environment
    let config = Config::from_env();
    info!(
        pending = %config.queues.pending,
        in_flight = %config.queues.in_flight,
        done = %config.queues.done,
        idle_ms = config.send_intervals.idle.as_millis() as u64,
        active_ms = config.send_intervals.active.as_millis() as u64,
        mail_api_token_set = config.mail_api_token.is_some(),
        "config_loaded"
    );

    if config.mail_api_token.is_none() {
        warn!("mail_api_token_missing");
    }

    let store = RedisQueueStore::connect(&config.redis_url)
        .await
        .context("Failed to connect to Redis")?;
    let pipeline = Pipeline::new(Arc::new(store), config.queues.clone());

    let sender = MailApiSender::new(
        &config.mail_api_base,
        &config.mail_api_user,
        config.mail_api_token.clone(),
        config.send_timeout(),
    )
    .context("Failed to create mail API client")?;
    info!(endpoint = %sender.endpoint(), "mail_api_client_created");

    let worker = DeliveryWorker::new(pipeline, Arc::new(sender), config.send_timeout());

    if config.recover_in_flight {
        match worker.recover_in_flight().await {
            Ok(count) => info!(count = count, "startup_recovery_complete"),
            Err(e) => warn!(error = %e, "startup_recovery_failed"),
        }
    }

    info!("sender_ready");

    PollLoop::new(worker, config.send_intervals)
        .run_until(shutdown_signal())
        .await;

    info!("sender_shutdown_complete");
    Ok(())
}
