use async_trait::async_trait;
use common::{OrderId, UserId};

use crate::{NewOrder, Order, Result};

/// Core trait for order ledger implementations.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Writes an order header and all of its items.
    ///
    /// The header and items are written atomically: either all rows are
    /// persisted or none are. The returned order carries the generated id.
    async fn place(&self, order: NewOrder) -> Result<Order>;

    /// Loads an order and its items.
    ///
    /// Returns None if the order doesn't exist.
    async fn get(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Lists a user's orders, oldest first.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Deletes an order together with its items.
    ///
    /// Returns false if the order did not exist.
    async fn delete(&self, order_id: OrderId) -> Result<bool>;
}
