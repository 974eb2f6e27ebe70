//! Read-only catalog price lookup.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{Money, ProductId};
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::{CartError, Result};

/// Trait for looking up a product's current catalog price.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Returns the current price, or None if the product does not exist.
    async fn price_of(&self, product_id: ProductId) -> Result<Option<Money>>;
}

/// In-memory price oracle for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPriceOracle {
    prices: Arc<RwLock<HashMap<ProductId, Money>>>,
}

impl InMemoryPriceOracle {
    /// Creates a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets (or changes) the price of a product.
    pub async fn set_price(&self, product_id: ProductId, price: Money) {
        self.prices.write().await.insert(product_id, price);
    }

    /// Removes a product from the catalog.
    pub async fn remove_product(&self, product_id: ProductId) {
        self.prices.write().await.remove(&product_id);
    }
}

#[async_trait]
impl PriceOracle for InMemoryPriceOracle {
    async fn price_of(&self, product_id: ProductId) -> Result<Option<Money>> {
        Ok(self.prices.read().await.get(&product_id).copied())
    }
}

/// Price oracle reading the catalog's `products` table.
///
/// Lookups time out with [`CartError::Timeout`].
#[derive(Clone)]
pub struct PgPriceOracle {
    pool: PgPool,
    timeout: Duration,
}

impl PgPriceOracle {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl PriceOracle for PgPriceOracle {
    async fn price_of(&self, product_id: ProductId) -> Result<Option<Money>> {
        let lookup = sqlx::query_scalar::<_, i64>("SELECT price_cents FROM products WHERE id = $1")
            .bind(product_id.as_i64())
            .fetch_optional(&self.pool);
        let cents = tokio::time::timeout(self.timeout, lookup)
            .await
            .map_err(|_| CartError::Timeout)??;

        Ok(cents.map(Money::from_cents))
    }
}
