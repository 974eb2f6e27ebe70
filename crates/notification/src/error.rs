//! Notification error types.

use thiserror::Error;

/// Errors that can occur while publishing or delivering notifications.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The intent is missing a mandatory field; nothing was published.
    #[error("Notification validation failed: {0}")]
    ValidationFailed(String),

    /// The `type` discriminator names no known delivery channel.
    #[error("Unknown notification type: {0}")]
    UnknownType(String),

    /// Broker connectivity, declare or publish failure.
    #[error("Channel error: {0}")]
    Channel(String),

    /// AMQP protocol error.
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    /// The consumer stream ended because the channel was closed.
    #[error("Channel closed")]
    ChannelClosed,

    /// A delivery gateway refused or failed the request.
    #[error("{gateway} gateway failed: {reason}")]
    Gateway {
        gateway: &'static str,
        reason: String,
    },

    /// HTTP transport error talking to the SMS gateway.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// The e-mail could not be built (bad address, header or body).
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Required configuration is missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl NotificationError {
    /// Returns true for broker-side failures (as opposed to bad input).
    pub fn is_channel_error(&self) -> bool {
        matches!(
            self,
            NotificationError::Channel(_)
                | NotificationError::Amqp(_)
                | NotificationError::ChannelClosed
        )
    }
}

/// Convenience type alias for notification results.
pub type Result<T> = std::result::Result<T, NotificationError>;
