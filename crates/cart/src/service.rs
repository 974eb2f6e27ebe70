//! Cart service providing the cart operations used by callers.

use common::{CallerIdentity, ProductId, UserId};

use crate::{CartError, CartKey, CartLine, CartStore, PriceOracle, Result};

/// Largest quantity a single add or update may carry.
pub const MAX_LINE_QUANTITY: i64 = 1_000_000;

/// Outcome of a best-effort [`CartService::clear`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearReport {
    pub cleared: usize,
    /// Lines that gained units after the snapshot and were kept with the
    /// surplus.
    pub kept: Vec<CartKey>,
    pub failed: Vec<CartKey>,
}

impl ClearReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Service for managing carts.
///
/// Wraps a [`CartStore`] and a [`PriceOracle`]. Every write that adds goods
/// re-reads the catalog price so the stored snapshot is never client input.
pub struct CartService<S: CartStore, O: PriceOracle> {
    store: S,
    oracle: O,
}

impl<S: CartStore, O: PriceOracle> CartService<S, O> {
    /// Creates a new cart service.
    pub fn new(store: S, oracle: O) -> Self {
        Self { store, oracle }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Adds `quantity` of a product to a user's cart at the current price.
    ///
    /// Repeated adds accumulate: two adds of one yield a quantity of two.
    #[tracing::instrument(skip(self))]
    pub async fn add_or_increment(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<CartLine> {
        ensure_quantity(quantity)?;

        let price = self
            .oracle
            .price_of(product_id)
            .await?
            .ok_or(CartError::ProductNotFound(product_id))?;

        let line = self
            .store
            .increment(CartKey::new(user_id, product_id), quantity, price)
            .await?;

        metrics::counter!("cart_lines_written_total").increment(1);
        tracing::debug!(quantity = line.quantity, price = %line.price, "cart line written");
        Ok(line)
    }

    /// Lists a user's cart. An empty cart is an empty list.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        self.store.list_user(user_id).await
    }

    /// Lists every cart line across all users.
    #[tracing::instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<CartLine>> {
        self.store.list_all().await
    }

    /// Lists what the caller may see: every cart for admins, their own
    /// cart for everyone else.
    pub async fn view(&self, caller: &CallerIdentity) -> Result<Vec<CartLine>> {
        if caller.is_privileged() {
            self.list_all().await
        } else {
            self.list(caller.user_id).await
        }
    }

    /// Overwrites the quantity of an existing line.
    ///
    /// The stored price is kept as is; it is not re-read from the catalog.
    #[tracing::instrument(skip(self))]
    pub async fn update(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<CartLine> {
        ensure_quantity(quantity)?;

        self.store
            .set_quantity(CartKey::new(user_id, product_id), quantity)
            .await?
            .ok_or(CartError::LineNotFound {
                user_id,
                product_id,
            })
    }

    /// Removes a line. Removing an absent line succeeds.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<()> {
        self.store
            .remove(CartKey::new(user_id, product_id))
            .await
    }

    /// Removes the quantities of a snapshot of lines, continuing past
    /// individual failures.
    ///
    /// Only the snapshot quantity is taken off each line, so an add that
    /// lands between the snapshot and the clear stays in the cart.
    /// Failures are logged and reported, never returned as an error.
    #[tracing::instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn clear(&self, lines: &[CartLine]) -> ClearReport {
        let mut report = ClearReport::default();
        for line in lines {
            let key = line.key();
            match self.store.subtract(key, line.quantity).await {
                Ok(0) => report.cleared += 1,
                Ok(left) => {
                    tracing::info!(%key, left, "cart line changed during checkout, keeping surplus");
                    report.kept.push(key);
                }
                Err(e) => {
                    tracing::warn!(%key, error = %e, "failed to clear cart line");
                    metrics::counter!("cart_clear_failed_total").increment(1);
                    report.failed.push(key);
                }
            }
        }
        report
    }
}

fn ensure_quantity(quantity: i64) -> Result<()> {
    if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
        return Err(CartError::InvalidQuantity(quantity));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryCartStore, InMemoryPriceOracle};
    use common::Money;

    async fn setup() -> (
        CartService<InMemoryCartStore, InMemoryPriceOracle>,
        InMemoryCartStore,
        InMemoryPriceOracle,
    ) {
        let store = InMemoryCartStore::new();
        let oracle = InMemoryPriceOracle::new();
        oracle.set_price(ProductId::new(10), Money::from_cents(500)).await;
        oracle.set_price(ProductId::new(11), Money::from_cents(350)).await;
        let service = CartService::new(store.clone(), oracle.clone());
        (service, store, oracle)
    }

    #[tokio::test]
    async fn test_add_uses_catalog_price() {
        let (service, _, _) = setup().await;
        let line = service
            .add_or_increment(UserId::new(1), ProductId::new(10), 2)
            .await
            .unwrap();

        assert_eq!(line.quantity, 2);
        assert_eq!(line.price, Money::from_cents(500));
    }

    #[tokio::test]
    async fn test_repeated_adds_accumulate_and_refresh_price() {
        let (service, _, oracle) = setup().await;
        let user = UserId::new(1);
        let product = ProductId::new(10);

        service.add_or_increment(user, product, 1).await.unwrap();
        oracle.set_price(product, Money::from_cents(600)).await;
        let line = service.add_or_increment(user, product, 3).await.unwrap();

        assert_eq!(line.quantity, 4);
        assert_eq!(line.price, Money::from_cents(600));
    }

    #[tokio::test]
    async fn test_unknown_product_is_rejected() {
        let (service, store, _) = setup().await;
        let result = service
            .add_or_increment(UserId::new(1), ProductId::new(99), 1)
            .await;

        assert!(matches!(result, Err(CartError::ProductNotFound(p)) if p == ProductId::new(99)));
        assert_eq!(store.line_count().await, 0);
    }

    #[tokio::test]
    async fn test_zero_quantity_is_rejected() {
        let (service, _, _) = setup().await;
        let result = service
            .add_or_increment(UserId::new(1), ProductId::new(10), 0)
            .await;
        assert!(matches!(result, Err(CartError::InvalidQuantity(0))));
    }

    #[tokio::test]
    async fn test_oversized_quantity_is_rejected() {
        let (service, store, _) = setup().await;
        let user = UserId::new(1);
        let product = ProductId::new(10);

        let result = service
            .add_or_increment(user, product, 40_000_000_000_000_000)
            .await;
        assert!(matches!(result, Err(CartError::InvalidQuantity(_))));
        assert_eq!(store.line_count().await, 0);

        service
            .add_or_increment(user, product, MAX_LINE_QUANTITY)
            .await
            .unwrap();
        let result = service.update(user, product, MAX_LINE_QUANTITY + 1).await;
        assert!(matches!(result, Err(CartError::InvalidQuantity(_))));
    }

    #[tokio::test]
    async fn test_update_keeps_price_without_revalidation() {
        let (service, _, oracle) = setup().await;
        let user = UserId::new(1);
        let product = ProductId::new(10);

        service.add_or_increment(user, product, 1).await.unwrap();
        oracle.set_price(product, Money::from_cents(900)).await;
        let line = service.update(user, product, 5).await.unwrap();

        assert_eq!(line.quantity, 5);
        assert_eq!(line.price, Money::from_cents(500));
    }

    #[tokio::test]
    async fn test_update_missing_line() {
        let (service, _, _) = setup().await;
        let result = service.update(UserId::new(1), ProductId::new(10), 5).await;
        assert!(matches!(result, Err(CartError::LineNotFound { .. })));
    }

    #[tokio::test]
    async fn test_view_by_role() {
        let (service, _, _) = setup().await;
        service
            .add_or_increment(UserId::new(1), ProductId::new(10), 1)
            .await
            .unwrap();
        service
            .add_or_increment(UserId::new(2), ProductId::new(11), 1)
            .await
            .unwrap();

        let own = service
            .view(&CallerIdentity::customer(UserId::new(1)))
            .await
            .unwrap();
        assert_eq!(own.len(), 1);

        let all = service
            .view(&CallerIdentity::admin(UserId::new(3)))
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_cart_lists_empty() {
        let (service, _, _) = setup().await;
        assert!(service.list(UserId::new(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_is_best_effort() {
        let (service, store, _) = setup().await;
        let line = service
            .add_or_increment(UserId::new(1), ProductId::new(10), 1)
            .await
            .unwrap();

        store.set_fail_on_remove(true);
        let report = service.clear(std::slice::from_ref(&line)).await;
        assert_eq!(report.cleared, 0);
        assert_eq!(report.failed, vec![line.key()]);

        store.set_fail_on_remove(false);
        let report = service.clear(std::slice::from_ref(&line)).await;
        assert!(report.is_complete());
        assert_eq!(report.cleared, 1);
        assert_eq!(store.line_count().await, 0);
    }

    #[tokio::test]
    async fn test_clear_keeps_units_added_after_snapshot() {
        let (service, store, _) = setup().await;
        let user = UserId::new(1);
        service
            .add_or_increment(user, ProductId::new(10), 2)
            .await
            .unwrap();
        let snapshot = service.list(user).await.unwrap();

        service
            .add_or_increment(user, ProductId::new(10), 1)
            .await
            .unwrap();
        let report = service.clear(&snapshot).await;

        assert_eq!(report.cleared, 0);
        assert_eq!(report.kept, vec![snapshot[0].key()]);
        let left = service.list(user).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].quantity, 1);
        assert_eq!(store.line_count().await, 1);
    }
}
