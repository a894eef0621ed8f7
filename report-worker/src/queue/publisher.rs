//! Publishing side of the notification queue.
//!
//! The worker never publishes. This is used by `campusmail-enqueue` and by
//! services that want the typed jobs instead of hand-written JSON.

use anyhow::{Context, Result};
use lapin::{
    options::{BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions},
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use tracing::{info, warn};

use super::types::NotificationJob;

/// Persistent delivery mode (AMQP `delivery-mode = 2`).
const PERSISTENT: u8 = 2;

/// Publishes jobs on a confirm-mode channel.
pub struct Publisher {
    connection: Connection,
    channel: Channel,
    queue: String,
}

impl Publisher {
    /// Open a channel and declare the durable queue.
    pub async fn connect(url: &str, queue: &str) -> Result<Self> {
        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .context("Failed to connect to RabbitMQ")?;

        let channel = connection
            .create_channel()
            .await
            .context("Failed to create channel")?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .context("Failed to enable publisher confirms")?;

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
            .context("Failed to declare notification queue")?;

        info!(queue = queue, "rabbitmq_publisher_ready");

        Ok(Self {
            connection,
            channel,
            queue: queue.to_string(),
        })
    }

    /// Publish `job` and wait for the broker to confirm it.
    ///
    /// Returns the message id the worker will log the job under.
    pub async fn publish(&self, job: &NotificationJob) -> Result<String> {
        let payload = serde_json::to_vec(job).context("Failed to encode job")?;
        let message_id = uuid::Uuid::new_v4().to_string();

        let properties = BasicProperties::default()
            .with_delivery_mode(PERSISTENT)
            .with_content_type("application/json".into())
            .with_message_id(message_id.as_str().into());

        let confirm = self
            .channel
            .basic_publish("", &self.queue, BasicPublishOptions::default(), &payload, properties)
            .await
            .context("Failed to publish job")?
            .await
            .context("Broker did not confirm publish")?;

        if confirm.is_nack() {
            anyhow::bail!("Broker rejected job {}", message_id);
        }

        info!(
            queue = %self.queue,
            job_id = %message_id,
            kind = job.kind(),
            to = %job.recipient(),
            "rabbitmq_job_published"
        );

        Ok(message_id)
    }

    pub async fn close(self) {
        if let Err(e) = self.channel.close(200, "Publisher done").await {
            warn!(error = %e, "rabbitmq_channel_close_error");
        }
        if let Err(e) = self.connection.close(200, "Publisher done").await {
            warn!(error = %e, "rabbitmq_connection_close_error");
        }
    }
}
