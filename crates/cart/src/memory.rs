use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{Money, UserId};
use tokio::sync::RwLock;

use crate::{CartError, CartKey, CartLine, CartStore, Result};

/// In-memory cart store implementation for testing.
///
/// This implementation keeps all lines in memory and provides
/// the same interface as the Redis implementation.
#[derive(Clone, Default)]
pub struct InMemoryCartStore {
    lines: Arc<RwLock<BTreeMap<CartKey, CartLine>>>,
    fail_on_remove: Arc<AtomicBool>,
}

impl InMemoryCartStore {
    /// Creates a new empty in-memory cart store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent remove fail until reset.
    pub fn set_fail_on_remove(&self, fail: bool) {
        self.fail_on_remove.store(fail, Ordering::SeqCst);
    }

    /// Returns the total number of lines stored.
    pub async fn line_count(&self) -> usize {
        self.lines.read().await.len()
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn increment(&self, key: CartKey, quantity: i64, price: Money) -> Result<CartLine> {
        // Held for the whole read-modify-write.
        let mut lines = self.lines.write().await;
        let line = lines.entry(key).or_insert_with(|| CartLine {
            user_id: key.user_id,
            product_id: key.product_id,
            quantity: 0,
            price,
        });
        line.quantity = line
            .quantity
            .checked_add(quantity)
            .ok_or(CartError::InvalidQuantity(quantity))?;
        line.price = price;
        Ok(line.clone())
    }

    async fn get(&self, key: CartKey) -> Result<Option<CartLine>> {
        Ok(self.lines.read().await.get(&key).cloned())
    }

    async fn set_quantity(&self, key: CartKey, quantity: i64) -> Result<Option<CartLine>> {
        let mut lines = self.lines.write().await;
        Ok(lines.get_mut(&key).map(|line| {
            line.quantity = quantity;
            line.clone()
        }))
    }

    async fn list_user(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        let lines = self.lines.read().await;
        Ok(lines
            .values()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<CartLine>> {
        Ok(self.lines.read().await.values().cloned().collect())
    }

    async fn remove(&self, key: CartKey) -> Result<()> {
        if self.fail_on_remove.load(Ordering::SeqCst) {
            return Err(CartError::Timeout);
        }
        self.lines.write().await.remove(&key);
        Ok(())
    }

    async fn subtract(&self, key: CartKey, quantity: i64) -> Result<i64> {
        if self.fail_on_remove.load(Ordering::SeqCst) {
            return Err(CartError::Timeout);
        }
        let mut lines = self.lines.write().await;
        let Some(line) = lines.get_mut(&key) else {
            return Ok(0);
        };
        let left = line.quantity.saturating_sub(quantity);
        if left <= 0 {
            lines.remove(&key);
            return Ok(0);
        }
        line.quantity = left;
        Ok(left)
    }
}
