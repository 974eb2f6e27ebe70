//! AMQP 0-9-1 plumbing over lapin: connection, queue declaration,
//! publishing with confirms and consumer deliveries.

use std::time::Duration;

use async_trait::async_trait;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    ConfirmSelectOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use tokio::sync::OnceCell;

use crate::consumer::InboundMessage;
use crate::{NotificationError, NotificationIntent, NotificationPublisher, Result};

const PERSISTENT: u8 = 2;
const JSON_CONTENT_TYPE: &str = "application/json";

/// Declaration of the notification queue.
///
/// Publisher and consumer both declare through this type so that the
/// declarations always match: durable, not exclusive, not auto-deleted,
/// bound to the default exchange under its own name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    pub name: String,
}

impl QueueSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn declare_options() -> QueueDeclareOptions {
        QueueDeclareOptions {
            durable: true,
            exclusive: false,
            auto_delete: false,
            ..QueueDeclareOptions::default()
        }
    }

    /// Declares the queue if absent. Idempotent.
    pub async fn declare(&self, channel: &Channel) -> Result<()> {
        channel
            .queue_declare(&self.name, Self::declare_options(), FieldTable::default())
            .await?;
        Ok(())
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self::new(crate::DEFAULT_QUEUE)
    }
}

/// An open broker connection, created once at process start.
pub struct AmqpConnection {
    connection: Connection,
}

impl AmqpConnection {
    /// Connects to the broker within the given timeout.
    #[tracing::instrument(skip(url))]
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        let properties = ConnectionProperties::default()
            .with_executor(tokio_executor_trait::Tokio::current())
            .with_reactor(tokio_reactor_trait::Tokio);

        let connection = tokio::time::timeout(timeout, Connection::connect(url, properties))
            .await
            .map_err(|_| NotificationError::Channel("broker connect timed out".to_string()))??;

        // No automatic reconnect: the process is restarted instead.
        connection.on_error(|err| {
            tracing::error!(error = %err, "broker connection lost");
        });

        tracing::info!("connected to broker");
        Ok(Self { connection })
    }

    /// Opens a new channel.
    pub async fn channel(&self) -> Result<Channel> {
        Ok(self.connection.create_channel().await?)
    }

    /// Returns true while the connection is usable.
    pub fn is_connected(&self) -> bool {
        self.connection.status().connected()
    }

    /// Declares the queue and subscribes to it, one unacknowledged message
    /// at a time.
    pub async fn consume(&self, settings: &QueueSettings) -> Result<Consumer> {
        let channel = self.channel().await?;
        settings.declare(&channel).await?;
        channel.basic_qos(1, BasicQosOptions::default()).await?;

        let tag = format!("notification-worker-{}", uuid::Uuid::new_v4());
        let consumer = channel
            .basic_consume(
                &settings.name,
                &tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        tracing::info!(queue = %settings.name, consumer_tag = %tag, "subscribed to queue");
        Ok(consumer)
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<()> {
        self.connection.close(200, "shutdown").await?;
        Ok(())
    }
}

/// Publishes notification intents to a durable queue.
///
/// The channel runs in publisher-confirm mode; `publish` waits for the
/// broker's confirm but never for a consumer. The queue is declared on the
/// first publish.
pub struct AmqpPublisher {
    channel: Channel,
    settings: QueueSettings,
    declared: OnceCell<()>,
    timeout: Duration,
}

impl AmqpPublisher {
    /// Opens a confirm-mode channel on the connection.
    pub async fn new(
        connection: &AmqpConnection,
        settings: QueueSettings,
        timeout: Duration,
    ) -> Result<Self> {
        let channel = connection.channel().await?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;

        Ok(Self {
            channel,
            settings,
            declared: OnceCell::new(),
            timeout,
        })
    }

    pub fn queue(&self) -> &str {
        &self.settings.name
    }

    async fn send(&self, body: &[u8]) -> Result<()> {
        self.declared
            .get_or_try_init(|| self.settings.declare(&self.channel))
            .await?;

        let properties = BasicProperties::default()
            .with_content_type(JSON_CONTENT_TYPE.into())
            .with_delivery_mode(PERSISTENT);

        let confirmation = self
            .channel
            .basic_publish(
                "",
                &self.settings.name,
                BasicPublishOptions::default(),
                body,
                properties,
            )
            .await?
            .await?;

        if confirmation.is_nack() {
            return Err(NotificationError::Channel(
                "broker refused the message".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationPublisher for AmqpPublisher {
    #[tracing::instrument(skip(self, intent), fields(queue = %self.settings.name, kind = %intent.kind))]
    async fn publish(&self, intent: &NotificationIntent) -> Result<()> {
        intent.validate()?;
        let body = intent.to_wire()?;

        let outcome = tokio::time::timeout(self.timeout, self.send(&body))
            .await
            .map_err(|_| NotificationError::Channel("publish timed out".to_string()))
            .and_then(|sent| sent);

        match &outcome {
            Ok(()) => {
                metrics::counter!("notifications_published_total", "type" => intent.kind.clone())
                    .increment(1);
                tracing::debug!("notification published");
            }
            Err(e) => {
                metrics::counter!("notifications_publish_failed_total", "type" => intent.kind.clone())
                    .increment(1);
                tracing::warn!(error = %e, "notification publish failed");
            }
        }
        outcome
    }
}

/// A message received from the broker.
pub struct AmqpDelivery(pub Delivery);

#[async_trait]
impl InboundMessage for AmqpDelivery {
    fn payload(&self) -> &[u8] {
        &self.0.data
    }

    async fn ack(self) -> Result<()> {
        self.0.acker.ack(BasicAckOptions::default()).await?;
        Ok(())
    }

    async fn reject(self) -> Result<()> {
        self.0
            .acker
            .nack(BasicNackOptions {
                multiple: false,
                requeue: false,
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_queue_is_durable_and_shared() {
        let settings = QueueSettings::default();
        assert_eq!(settings.name, "notification_queue");

        let options = QueueSettings::declare_options();
        assert!(options.durable);
        assert!(!options.exclusive);
        assert!(!options.auto_delete);
    }
}
