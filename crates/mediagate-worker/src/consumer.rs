//! NATS JetStream pull consumer
//!
//! Delivery is at-least-once: messages are acked explicitly after the handler ran, and
//! a nak (or a missed ack deadline) triggers redelivery with backoff until the delivery
//! limit is reached.

use anyhow::{Context, Result};
use async_nats::jetstream::{
    self,
    consumer::{pull, AckPolicy, PullConsumer},
    AckKind,
};
use futures::StreamExt;
use mediagate_core::NatsConfig;
use mediagate_services::MessageHandler;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::dispatch::{dispatch, Disposition};

pub const ACK_WAIT: Duration = Duration::from_secs(10);
pub const MAX_DELIVER: i64 = 5;
pub const REDELIVERY_BACKOFF: [Duration; 2] = [Duration::from_millis(100), Duration::from_millis(200)];

/// Where to consume from.
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub url: String,
    pub stream_name: String,
    pub durable_name: String,
    pub filter_subject: String,
}

impl From<&NatsConfig> for ConsumerSettings {
    fn from(config: &NatsConfig) -> Self {
        Self {
            url: config.url.clone(),
            stream_name: config.stream_name.clone(),
            durable_name: config.consumer_name.clone(),
            filter_subject: config.subject.clone(),
        }
    }
}

impl ConsumerSettings {
    /// Durable pull consumer with explicit acks.
    pub fn pull_config(&self) -> pull::Config {
        pull::Config {
            durable_name: Some(self.durable_name.clone()),
            ack_policy: AckPolicy::Explicit,
            ack_wait: ACK_WAIT,
            max_deliver: MAX_DELIVER,
            backoff: REDELIVERY_BACKOFF.to_vec(),
            filter_subject: self.filter_subject.clone(),
            ..Default::default()
        }
    }
}

pub struct NotificationConsumer {
    settings: ConsumerSettings,
    handler: Arc<dyn MessageHandler>,
}

impl NotificationConsumer {
    pub fn new(settings: ConsumerSettings, handler: Arc<dyn MessageHandler>) -> Self {
        Self { settings, handler }
    }

    async fn connect(&self) -> Result<PullConsumer> {
        let client = async_nats::connect(&self.settings.url)
            .await
            .with_context(|| format!("failed to connect to NATS at {}", self.settings.url))?;
        let context = jetstream::new(client);

        let stream = context
            .get_stream(&self.settings.stream_name)
            .await
            .with_context(|| format!("stream {} not found", self.settings.stream_name))?;

        let consumer: PullConsumer = stream
            .get_or_create_consumer(&self.settings.durable_name, self.settings.pull_config())
            .await
            .context("failed to create durable consumer")?;

        Ok(consumer)
    }

    /// Consume until `shutdown` fires. A message being handled when shutdown fires is
    /// finished and acknowledged first.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let consumer = self.connect().await?;
        let mut messages = consumer
            .messages()
            .await
            .context("failed to open message stream")?;

        tracing::info!(
            stream = %self.settings.stream_name,
            consumer = %self.settings.durable_name,
            subject = %self.settings.filter_subject,
            "Consuming storage notifications"
        );

        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown requested, consumer stopping");
                    break;
                }
                next = messages.next() => next,
            };

            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Failed to receive message");
                    continue;
                }
                None => {
                    tracing::warn!("Message stream closed");
                    break;
                }
            };

            if let Ok(info) = message.info() {
                tracing::debug!(
                    subject = %message.subject,
                    delivered = info.delivered,
                    "Received storage notification"
                );
            }

            let acked = match dispatch(self.handler.as_ref(), &message.payload).await {
                Disposition::Ack => message.ack().await,
                Disposition::Nak => message.ack_with(AckKind::Nak(None)).await,
            };
            if let Err(e) = acked {
                tracing::error!(error = %e, "Failed to acknowledge message");
            }
        }

        Ok(())
    }
}
