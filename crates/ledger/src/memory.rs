use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, UserId};
use tokio::sync::RwLock;

use crate::{LedgerError, NewOrder, Order, OrderItem, OrderLedger, OrderStatus, Result};

#[derive(Debug, Default)]
struct LedgerState {
    orders: BTreeMap<OrderId, Order>,
    last_id: i64,
}

/// In-memory order ledger implementation for testing.
///
/// Mirrors the transactional behaviour of the PostgreSQL ledger: a rejected
/// item write leaves no header behind.
#[derive(Clone, Default)]
pub struct InMemoryOrderLedger {
    state: Arc<RwLock<LedgerState>>,
    fail_on_item_insert: Arc<AtomicBool>,
}

impl InMemoryOrderLedger {
    /// Creates a new empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent item insert fail until reset.
    pub fn set_fail_on_item_insert(&self, fail: bool) {
        self.fail_on_item_insert.store(fail, Ordering::SeqCst);
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl OrderLedger for InMemoryOrderLedger {
    async fn place(&self, order: NewOrder) -> Result<Order> {
        order.validate()?;

        let mut state = self.state.write().await;

        if self.fail_on_item_insert.load(Ordering::SeqCst) {
            return Err(LedgerError::WriteRejected(
                "item insert failed, order rolled back".to_string(),
            ));
        }

        let order_id = OrderId::new(state.last_id + 1);
        let total = order.total()?;
        let items = order
            .items
            .into_iter()
            .map(|item| OrderItem {
                order_id,
                product_id: item.product_id,
                quantity: item.quantity,
                price: item.price,
            })
            .collect();

        let placed = Order {
            id: order_id,
            user_id: order.user_id,
            total,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            items,
        };

        state.last_id = order_id.as_i64();
        state.orders.insert(order_id, placed.clone());
        Ok(placed)
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&order_id).cloned())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete(&self, order_id: OrderId) -> Result<bool> {
        Ok(self.state.write().await.orders.remove(&order_id).is_some())
    }
}
