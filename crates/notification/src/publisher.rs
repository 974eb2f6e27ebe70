//! Notification publisher trait and in-memory implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{NotificationError, NotificationIntent, Result};

/// Trait for handing notification intents to the broker.
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    /// Validates, serializes and publishes one intent.
    ///
    /// Returns once the broker has accepted the message, not once it has
    /// been delivered. An invalid intent fails with `ValidationFailed`
    /// before anything is sent.
    async fn publish(&self, intent: &NotificationIntent) -> Result<()>;
}

/// In-memory publisher for testing.
///
/// Keeps the serialized message bodies in publish order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPublisher {
    messages: Arc<Mutex<Vec<Vec<u8>>>>,
    fail_on_publish: Arc<AtomicBool>,
}

impl InMemoryPublisher {
    /// Creates a new in-memory publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the publisher to fail every publish with a channel error.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.fail_on_publish.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of messages accepted so far.
    pub async fn message_count(&self) -> usize {
        self.messages.lock().await.len()
    }

    /// Returns the accepted intents, decoded from their wire form.
    pub async fn published(&self) -> Vec<NotificationIntent> {
        self.messages
            .lock()
            .await
            .iter()
            .filter_map(|body| NotificationIntent::from_wire(body).ok())
            .collect()
    }

    /// Removes and returns the raw message bodies.
    pub async fn take_messages(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.messages.lock().await)
    }
}

#[async_trait]
impl NotificationPublisher for InMemoryPublisher {
    async fn publish(&self, intent: &NotificationIntent) -> Result<()> {
        intent.validate()?;

        if self.fail_on_publish.load(Ordering::SeqCst) {
            return Err(NotificationError::Channel("broker unavailable".to_string()));
        }

        let body = intent.to_wire()?;
        self.messages.lock().await.push(body);
        Ok(())
    }
}
