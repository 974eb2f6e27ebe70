//! The worker loop: pull, deliver, acknowledge.

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};

use crate::{NotificationDispatcher, NotificationError, Result};

/// A message handed to the worker by the broker.
///
/// Exactly one of `ack` or `reject` is called per message.
#[async_trait]
pub trait InboundMessage: Send + Sized + 'static {
    fn payload(&self) -> &[u8];

    /// Removes the message from the queue.
    async fn ack(self) -> Result<()>;

    /// Drops the message without redelivery.
    async fn reject(self) -> Result<()>;
}

/// Counters kept across a consumer run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub delivered: u64,
    pub rejected: u64,
}

/// Processes messages sequentially, one in flight at a time.
pub struct NotificationConsumer {
    dispatcher: NotificationDispatcher,
}

impl NotificationConsumer {
    pub fn new(dispatcher: NotificationDispatcher) -> Self {
        Self { dispatcher }
    }

    /// Handles one message. Returns true if it was delivered and
    /// acknowledged, false if it was rejected.
    ///
    /// Any delivery failure leads to a reject without requeue; there is no
    /// second attempt.
    pub async fn handle<M: InboundMessage>(&self, message: M) -> Result<bool> {
        match self.dispatcher.dispatch(message.payload()).await {
            Ok(intent) => {
                message.ack().await?;
                metrics::counter!("notifications_delivered_total", "type" => intent.kind.clone())
                    .increment(1);
                tracing::info!(kind = %intent.kind, to = %intent.to, "notification delivered");
                Ok(true)
            }
            Err(e) => {
                message.reject().await?;
                metrics::counter!("notifications_rejected_total").increment(1);
                tracing::warn!(error = %e, "notification rejected");
                Ok(false)
            }
        }
    }

    /// Runs until the stream ends.
    ///
    /// A stream error means the channel is gone and is returned to the
    /// caller; the end of the stream is a normal return.
    pub async fn run<S, M, E>(&self, stream: S) -> Result<ConsumerStats>
    where
        S: Stream<Item = std::result::Result<M, E>>,
        M: InboundMessage,
        E: Into<NotificationError>,
    {
        let mut stream = std::pin::pin!(stream);
        let mut stats = ConsumerStats::default();

        while let Some(next) = stream.next().await {
            let message = next.map_err(Into::into)?;
            if self.handle(message).await? {
                stats.delivered += 1;
            } else {
                stats.rejected += 1;
            }
        }

        tracing::info!(
            delivered = stats.delivered,
            rejected = stats.rejected,
            "consumer stream ended"
        );
        Ok(stats)
    }
}
