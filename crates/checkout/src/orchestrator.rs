//! Checkout orchestrator: cart to order, then notifications.

use std::sync::Arc;

use cart::{CartService, CartStore, PriceOracle};
use common::{CallerIdentity, Money, OrderId, UserId};
use ledger::{NewOrder, NewOrderItem, Order, OrderLedger, OrderStatus};
use serde::Serialize;

use crate::{CheckoutError, NotificationFanout, OrderPlaced, Result};

/// What a successful checkout returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutReceipt {
    pub order_id: OrderId,
    pub total: Money,
    pub status: OrderStatus,
}

/// Turns a user's cart into a persisted order.
///
/// Steps, stopping at the first failure:
/// 1. resolve the target user from the caller identity
/// 2. load the cart (empty fails with `EmptyCart`, nothing written)
/// 3. total the stored price snapshots
/// 4. write header and items in one ledger transaction
/// 5. clear the consumed lines, best effort
/// 6. hand the order to the notification fan-out and return
pub struct CheckoutOrchestrator<S, O, L>
where
    S: CartStore,
    O: PriceOracle,
    L: OrderLedger,
{
    cart: Arc<CartService<S, O>>,
    ledger: L,
    fanout: Arc<NotificationFanout>,
}

impl<S, O, L> CheckoutOrchestrator<S, O, L>
where
    S: CartStore,
    O: PriceOracle,
    L: OrderLedger,
{
    pub fn new(cart: Arc<CartService<S, O>>, ledger: L, fanout: Arc<NotificationFanout>) -> Self {
        Self {
            cart,
            ledger,
            fanout,
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Places an order from the target user's cart.
    ///
    /// `target` is honoured only for privileged callers. The only hard
    /// failures after the cart was loaded are ledger write errors; cart
    /// clearing and notifications never fail the checkout.
    #[tracing::instrument(skip(self), fields(caller = %caller.user_id, role = %caller.role.as_str()))]
    pub async fn checkout(
        &self,
        caller: &CallerIdentity,
        target: Option<UserId>,
    ) -> Result<CheckoutReceipt> {
        let started = std::time::Instant::now();
        let result = self.place(caller.resolve_target(target)).await;

        let outcome = match &result {
            Ok(_) => "placed",
            Err(CheckoutError::EmptyCart(_)) => "empty_cart",
            Err(CheckoutError::InvalidOrder(_)) => "invalid_order",
            Err(_) => "failed",
        };
        metrics::counter!("checkouts_total", "outcome" => outcome).increment(1);
        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());

        result
    }

    async fn place(&self, user_id: UserId) -> Result<CheckoutReceipt> {
        let lines = self.cart.list(user_id).await?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart(user_id));
        }

        let items = lines
            .iter()
            .map(|line| NewOrderItem::new(line.product_id, line.quantity, line.price))
            .collect();
        let new_order = NewOrder::new(user_id, items);
        let total = new_order.total().map_err(|e| {
            tracing::warn!(%user_id, error = %e, "cart cannot form an order");
            CheckoutError::InvalidOrder(e)
        })?;

        let order = self.ledger.place(new_order).await.map_err(|e| {
            tracing::error!(%user_id, error = %e, "order persist failed");
            CheckoutError::OrderPersistFailure(e)
        })?;
        tracing::info!(order_id = %order.id, %user_id, %total, "order placed");

        let report = self.cart.clear(&lines).await;
        if !report.is_complete() {
            tracing::warn!(
                order_id = %order.id,
                failed = report.failed.len(),
                "cart partially cleared after checkout"
            );
        }

        self.fanout.submit(OrderPlaced {
            order_id: order.id,
            user_id,
            total,
            items: order.items.clone(),
        });

        Ok(CheckoutReceipt {
            order_id: order.id,
            total,
            status: order.status,
        })
    }

    /// Orders of the target user, resolved like checkout.
    #[tracing::instrument(skip(self))]
    pub async fn orders_for(
        &self,
        caller: &CallerIdentity,
        target: Option<UserId>,
    ) -> Result<Vec<Order>> {
        Ok(self
            .ledger
            .orders_for_user(caller.resolve_target(target))
            .await?)
    }

    /// Deletes an order. Admins may delete any order, other callers only
    /// their own.
    #[tracing::instrument(skip(self))]
    pub async fn delete_order(&self, caller: &CallerIdentity, order_id: OrderId) -> Result<()> {
        let order = self
            .ledger
            .get(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(order_id))?;

        if !caller.is_privileged() && order.user_id != caller.user_id {
            return Err(CheckoutError::Forbidden {
                caller: caller.user_id,
                order_id,
            });
        }

        if !self.ledger.delete(order_id).await? {
            return Err(CheckoutError::OrderNotFound(order_id));
        }
        tracing::info!(%order_id, "order deleted");
        Ok(())
    }
}
