//! Asynchronous notification pipeline.
//!
//! The publishing side turns a [`NotificationIntent`] into a persistent
//! message on a durable queue. The consuming side is a long-running worker
//! that pulls one message at a time, hands it to the SMS or e-mail gateway
//! according to its `type`, and acknowledges it only when delivery
//! succeeded.
//!
//! Delivery is attempted at most once: a failed message is rejected without
//! requeue and is not retried.

pub mod amqp;
pub mod config;
pub mod consumer;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod intent;
pub mod publisher;

pub use amqp::{AmqpConnection, AmqpDelivery, AmqpPublisher, QueueSettings};
pub use config::{SmsConfig, SmtpConfig, WorkerConfig};
pub use consumer::{ConsumerStats, InboundMessage, NotificationConsumer};
pub use dispatcher::NotificationDispatcher;
pub use error::{NotificationError, Result};
pub use gateway::{
    EmailGateway, HttpSmsGateway, InMemoryEmailGateway, InMemorySmsGateway, SentEmail, SentSms,
    SmsGateway, SmtpEmailGateway,
};
pub use intent::{DeliveryChannel, NotificationIntent};
pub use publisher::{InMemoryPublisher, NotificationPublisher};

/// Queue shared by the publisher and the worker unless configured otherwise.
pub const DEFAULT_QUEUE: &str = "notification_queue";
