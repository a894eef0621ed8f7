//! Pull side of the notification queue.
//!
//! The worker pool only sees the [`JobQueue`] and [`DeliveryAcker`] traits.
//! [`AmqpQueue`] implements them on top of a lapin consumer; tests plug in
//! an in-memory queue instead.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use lapin::{
    options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions, QueueDeclareOptions},
    types::FieldTable,
    Channel, Connection, ConnectionProperties, Consumer,
};
use thiserror::Error;
use tracing::{info, warn};

use super::types::NotificationJob;

#[derive(Debug, Error)]
pub enum QueueError {
    /// The message body is not a valid notification job.
    #[error("malformed job payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("broker error: {0}")]
    Broker(String),
}

/// Signals the outcome of one delivery back to the broker.
#[async_trait]
pub trait DeliveryAcker: Send + Sync {
    /// The job finished; remove it from the queue.
    async fn complete(&self) -> Result<(), QueueError>;

    /// The job failed. With `requeue` the broker may deliver it again.
    async fn fail(&self, requeue: bool) -> Result<(), QueueError>;
}

/// One job handed out by a [`JobQueue`].
pub struct Delivery {
    pub id: String,
    /// Set when the broker has delivered this message before
    pub redelivered: bool,
    pub job: Result<NotificationJob, QueueError>,
    pub acker: Box<dyn DeliveryAcker>,
}

/// Pull-based source of jobs.
#[async_trait]
pub trait JobQueue: Send {
    /// Wait for the next delivery. `None` means the queue is closed for good.
    async fn next_delivery(&mut self) -> Option<Result<Delivery, QueueError>>;
}

/// RabbitMQ consumer for the notification queue.
pub struct AmqpQueue {
    connection: Connection,
    channel: Channel,
    consumer: Consumer,
    queue: String,
}

impl AmqpQueue {
    /// Connect, declare the durable queue and start consuming.
    ///
    /// `prefetch` caps unacknowledged deliveries and should match the
    /// worker's concurrency.
    pub async fn connect(url: &str, queue: &str, prefetch: u16) -> Result<Self> {
        info!(url_length = url.len(), "rabbitmq_connecting");

        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .context("Failed to connect to RabbitMQ")?;

        info!("rabbitmq_connected");

        let channel = connection
            .create_channel()
            .await
            .context("Failed to create channel")?;

        channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await
            .context("Failed to set QoS")?;

        info!(prefetch_count = prefetch, "rabbitmq_qos_set");

        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .context("Failed to declare queue")?;

        info!(queue = queue, "rabbitmq_queue_declared");

        let consumer = channel
            .basic_consume(
                queue,
                "campusmail-worker",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .context("Failed to start consumer")?;

        info!(queue = queue, "rabbitmq_consumer_started");

        Ok(Self {
            connection,
            channel,
            consumer,
            queue: queue.to_string(),
        })
    }

    /// Close the channel and connection gracefully.
    pub async fn close(self) {
        if let Err(e) = self.channel.close(200, "Normal shutdown").await {
            warn!(error = %e, "rabbitmq_channel_close_error");
        }

        if let Err(e) = self.connection.close(200, "Normal shutdown").await {
            warn!(error = %e, "rabbitmq_connection_close_error");
        }

        info!(queue = %self.queue, "rabbitmq_consumer_closed");
    }
}

#[async_trait]
impl JobQueue for AmqpQueue {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, QueueError>> {
        let delivery = match self.consumer.next().await? {
            Ok(delivery) => delivery,
            Err(e) => return Some(Err(QueueError::Broker(e.to_string()))),
        };

        let id = delivery
            .properties
            .message_id()
            .as_ref()
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("tag-{}", delivery.delivery_tag));

        info!(
            queue = %self.queue,
            job_id = %id,
            delivery_tag = delivery.delivery_tag,
            body_length = delivery.data.len(),
            "rabbitmq_job_received"
        );

        Some(Ok(Delivery {
            id,
            redelivered: delivery.redelivered,
            job: serde_json::from_slice(&delivery.data).map_err(QueueError::from),
            acker: Box::new(AmqpAcker {
                channel: self.channel.clone(),
                delivery_tag: delivery.delivery_tag,
            }),
        }))
    }
}

struct AmqpAcker {
    channel: Channel,
    delivery_tag: u64,
}

#[async_trait]
impl DeliveryAcker for AmqpAcker {
    async fn complete(&self) -> Result<(), QueueError> {
        self.channel
            .basic_ack(self.delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| QueueError::Broker(e.to_string()))
    }

    async fn fail(&self, requeue: bool) -> Result<(), QueueError> {
        self.channel
            .basic_nack(
                self.delivery_tag,
                BasicNackOptions {
                    requeue,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| QueueError::Broker(e.to_string()))
    }
}
