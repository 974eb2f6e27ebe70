//! Best-effort order notifications, decoupled from the checkout response.

use std::sync::Arc;

use common::{Money, OrderId, UserId};
use ledger::OrderItem;
use notification::{NotificationIntent, NotificationPublisher};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::UserDirectory;

/// A placed order whose notifications are still to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub total: Money,
    pub items: Vec<OrderItem>,
}

/// Text of the SMS sent to the purchaser.
pub fn order_placed_sms(order_id: OrderId) -> String {
    format!("Your order #{order_id} has been placed successfully!")
}

/// Subject and body of the e-mail sent to every admin.
pub fn admin_order_email(order: &OrderPlaced) -> (String, String) {
    let subject = format!("New Order Placed: #{}", order.order_id);

    let mut body = format!(
        "A new order has been placed.\n\nOrder ID: {}\nTotal Amount: {}\n\nItems:\n",
        order.order_id, order.total
    );
    for item in &order.items {
        body.push_str(&format!(
            "Product ID: {}, Quantity: {}, Price: {}\n",
            item.product_id, item.quantity, item.price
        ));
    }

    (subject, body)
}

/// Background worker that turns placed orders into notification intents.
///
/// Submissions go through an unbounded channel to a single task, so the
/// caller never waits on the directory or the broker. [`shutdown`] stops
/// intake, lets the task finish what was already queued and joins it.
///
/// [`shutdown`]: NotificationFanout::shutdown
pub struct NotificationFanout {
    sender: mpsc::UnboundedSender<OrderPlaced>,
    stop: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl NotificationFanout {
    /// Spawns the worker task on the current runtime.
    pub fn spawn(
        directory: Arc<dyn UserDirectory>,
        publisher: Arc<dyn NotificationPublisher>,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let stop = CancellationToken::new();

        let worker = FanoutWorker {
            directory,
            publisher,
        };
        let handle = tokio::spawn(worker.run(receiver, stop.clone()));

        Self {
            sender,
            stop,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Queues notifications for a placed order. Never blocks and never
    /// fails the caller.
    pub fn submit(&self, order: OrderPlaced) {
        if self.stop.is_cancelled() {
            tracing::warn!(order_id = %order.order_id, "fan-out stopped, notifications dropped");
            return;
        }

        if let Err(rejected) = self.sender.send(order) {
            tracing::warn!(
                order_id = %rejected.0.order_id,
                "fan-out worker gone, notifications dropped"
            );
        }
    }

    /// Stops accepting work and waits for queued orders to be processed.
    ///
    /// Calling it more than once is harmless.
    pub async fn shutdown(&self) {
        self.stop.cancel();

        let Some(handle) = self.worker.lock().await.take() else {
            return;
        };
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "fan-out worker panicked");
        }
    }
}

struct FanoutWorker {
    directory: Arc<dyn UserDirectory>,
    publisher: Arc<dyn NotificationPublisher>,
}

impl FanoutWorker {
    async fn run(self, mut receiver: mpsc::UnboundedReceiver<OrderPlaced>, stop: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                next = receiver.recv() => match next {
                    Some(order) => self.notify(order).await,
                    None => break,
                },
                () = stop.cancelled() => {
                    receiver.close();
                    while let Some(order) = receiver.recv().await {
                        self.notify(order).await;
                    }
                    break;
                }
            }
        }
        tracing::debug!("fan-out worker stopped");
    }

    #[tracing::instrument(skip(self, order), fields(order_id = %order.order_id))]
    async fn notify(&self, order: OrderPlaced) {
        self.notify_purchaser(&order).await;
        self.notify_admins(&order).await;
    }

    async fn notify_purchaser(&self, order: &OrderPlaced) {
        let phone = match self.directory.phone_for(order.user_id).await {
            Ok(Some(phone)) => phone,
            Ok(None) => {
                skipped("no_phone");
                tracing::warn!(user_id = %order.user_id, "purchaser has no phone number");
                return;
            }
            Err(e) => {
                skipped("directory");
                tracing::warn!(user_id = %order.user_id, error = %e, "failed to look up purchaser phone");
                return;
            }
        };

        let intent = NotificationIntent::sms(phone, order_placed_sms(order.order_id));
        if let Err(e) = self.publisher.publish(&intent).await {
            skipped("publish");
            tracing::warn!(user_id = %order.user_id, error = %e, "failed to enqueue sms");
        }
    }

    async fn notify_admins(&self, order: &OrderPlaced) {
        let admins = match self.directory.admin_emails().await {
            Ok(admins) => admins,
            Err(e) => {
                skipped("directory");
                tracing::warn!(error = %e, "failed to fetch admin emails");
                return;
            }
        };

        if admins.is_empty() {
            skipped("no_admins");
            tracing::warn!("no admin emails found");
            return;
        }

        let (subject, body) = admin_order_email(order);
        for admin in admins {
            let intent = NotificationIntent::email(admin.as_str(), subject.as_str(), body.as_str());
            if let Err(e) = self.publisher.publish(&intent).await {
                skipped("publish");
                tracing::warn!(to = %admin, error = %e, "failed to enqueue admin email");
            }
        }
    }
}

fn skipped(reason: &'static str) {
    metrics::counter!("notification_fanout_skipped_total", "reason" => reason).increment(1);
}
