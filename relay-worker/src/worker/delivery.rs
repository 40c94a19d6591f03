//! Delivery worker: `pending → in_flight → send → done`.
//!
//! Each cycle claims at most one message. On success the message is stamped
//! with `done_at` and forwarded to the done list; on any failure it is
//! dropped from in flight without forwarding or re-queueing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::timeout;
use tracing::{error, info};

use crate::error::{QueueResult, RelayError, TransportError};
use crate::mail::{build_transport_payload, MailSender};
use crate::queue::{Message, Pipeline};
use crate::worker::scheduler::{Cycle, CycleOutcome};

/// Sender role of the relay.
pub struct DeliveryWorker {
    pipeline: Pipeline,
    sender: Arc<dyn MailSender>,
    send_timeout: Duration,
}

impl DeliveryWorker {
    pub fn new(pipeline: Pipeline, sender: Arc<dyn MailSender>, send_timeout: Duration) -> Self {
        Self {
            pipeline,
            sender,
            send_timeout,
        }
    }

    /// Requeue entries left in flight by a previous run.
    pub async fn recover_in_flight(&self) -> QueueResult<usize> {
        let names = self.pipeline.names();
        self.pipeline.recover(&names.in_flight, &names.pending).await
    }

    /// Drop a failed message from in flight and hand back the original error.
    async fn give_up(&self, message: &Message, cause: RelayError) -> RelayError {
        error!(
            message_id = %message.id,
            to = %message.to,
            error = %cause,
            "message_send_failed"
        );
        let in_flight = &self.pipeline.names().in_flight;
        if let Err(e) = self.pipeline.abandon(in_flight, &message.id).await {
            error!(message_id = %message.id, error = %e, "message_abandon_failed");
        }
        cause
    }

    async fn deliver(&self, message: &Message) -> Result<(), RelayError> {
        let payload = build_transport_payload(message)?;

        info!(
            message_id = %message.id,
            to = %message.to,
            subject = %message.subject,
            "message_sending"
        );

        match timeout(self.send_timeout, self.sender.send(&payload)).await {
            Ok(result) => result?,
            Err(_) => return Err(TransportError::Timeout(self.send_timeout.as_millis() as u64).into()),
        }
        Ok(())
    }
}

#[async_trait]
impl Cycle for DeliveryWorker {
    fn role(&self) -> &'static str {
        "sender"
    }

    async fn run_cycle(&mut self) -> Result<CycleOutcome, RelayError> {
        let names = self.pipeline.names().clone();

        let Some(message) = self.pipeline.claim_next(&names.pending, &names.in_flight).await? else {
            return Ok(CycleOutcome::Idle);
        };

        if let Err(cause) = self.deliver(&message).await {
            return Err(self.give_up(&message, cause).await);
        }

        let delivered = message.delivered_at(Utc::now());
        self.pipeline
            .forward(&names.in_flight, &names.done, &delivered)
            .await?;

        info!(
            message_id = %message.id,
            to = %message.to,
            subject = %message.subject,
            "message_sent"
        );

        Ok(CycleOutcome::Worked)
    }
}
