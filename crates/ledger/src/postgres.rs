use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{LedgerError, NewOrder, Order, OrderItem, OrderLedger, OrderStatus, Result};

/// Bound applied to each ledger call unless overridden.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// PostgreSQL-backed order ledger implementation.
///
/// Every call, including waiting for a pooled connection, is bounded by
/// the configured timeout. A timed-out `place` rolls back when its
/// transaction is dropped.
#[derive(Clone)]
pub struct PostgresOrderLedger {
    pool: PgPool,
    timeout: Duration,
}

impl PostgresOrderLedger {
    /// Creates a new PostgreSQL order ledger.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn bounded<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| LedgerError::Timeout)?
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_header(row: &PgRow) -> Result<Order> {
        Ok(Order {
            id: OrderId::new(row.try_get("id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            total: Money::from_cents(row.try_get("total_cents")?),
            status: OrderStatus::from(row.try_get::<String, _>("status")?),
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            items: Vec::new(),
        })
    }

    fn row_to_item(row: &PgRow) -> Result<OrderItem> {
        Ok(OrderItem {
            order_id: OrderId::new(row.try_get("order_id")?),
            product_id: ProductId::new(row.try_get("product_id")?),
            quantity: row.try_get("quantity")?,
            price: Money::from_cents(row.try_get("price_cents")?),
        })
    }

    async fn load_items(&self, order_ids: &[i64]) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, product_id, quantity, price_cents
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id ASC, id ASC
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_item).collect()
    }

    async fn attach_items(&self, mut orders: Vec<Order>) -> Result<Vec<Order>> {
        if orders.is_empty() {
            return Ok(orders);
        }
        let ids: Vec<i64> = orders.iter().map(|o| o.id.as_i64()).collect();
        for item in self.load_items(&ids).await? {
            if let Some(order) = orders.iter_mut().find(|o| o.id == item.order_id) {
                order.items.push(item);
            }
        }
        Ok(orders)
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order> {
        let total = order.total()?;

        // Header and items commit together or not at all.
        let mut tx = self.pool.begin().await?;

        let header = sqlx::query(
            r#"
            INSERT INTO orders (user_id, total_cents, status, created_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id, user_id, total_cents, status, created_at
            "#,
        )
        .bind(order.user_id.as_i64())
        .bind(total.cents())
        .bind(OrderStatus::Pending.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let mut placed = Self::row_to_header(&header)?;

        for item in &order.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, quantity, price_cents)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(placed.id.as_i64())
            .bind(item.product_id.as_i64())
            .bind(item.quantity)
            .bind(item.price.cents())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!(
                    order_id = %placed.id,
                    product_id = %item.product_id,
                    error = %e,
                    "order item insert failed, rolling back"
                );
                LedgerError::Database(e)
            })?;

            placed.items.push(OrderItem {
                order_id: placed.id,
                product_id: item.product_id,
                quantity: item.quantity,
                price: item.price,
            });
        }

        tx.commit().await?;
        Ok(placed)
    }

    async fn find(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, user_id, total_cents, status, created_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(order_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let header = Self::row_to_header(&row)?;
                Ok(self.attach_items(vec![header]).await?.pop())
            }
            None => Ok(None),
        }
    }

    async fn find_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, total_cents, status, created_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        let headers = rows
            .iter()
            .map(Self::row_to_header)
            .collect::<Result<Vec<_>>>()?;
        self.attach_items(headers).await
    }

    async fn delete_row(&self, order_id: OrderId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id.as_i64())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl OrderLedger for PostgresOrderLedger {
    #[tracing::instrument(skip(self, order), fields(user_id = %order.user_id, items = order.items.len()))]
    async fn place(&self, order: NewOrder) -> Result<Order> {
        order.validate()?;
        let placed = self.bounded(self.insert_order(order)).await?;
        metrics::counter!("ledger_orders_written_total").increment(1);
        Ok(placed)
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        self.bounded(self.find(order_id)).await
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        self.bounded(self.find_for_user(user_id)).await
    }

    async fn delete(&self, order_id: OrderId) -> Result<bool> {
        self.bounded(self.delete_row(order_id)).await
    }
}

#[cfg(test)]
mod tests {
    use sqlx::postgres::PgPoolOptions;
    use tokio::net::TcpListener;

    use super::*;
    use crate::NewOrderItem;

    /// A pool whose server accepts connections and never answers.
    async fn silent_pool() -> PgPool {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        PgPoolOptions::new()
            .acquire_timeout(Duration::from_secs(30))
            .connect_lazy(&format!("postgres://postgres:postgres@{addr}/postgres"))
            .unwrap()
    }

    #[tokio::test]
    async fn test_unresponsive_database_times_out() {
        let ledger =
            PostgresOrderLedger::new(silent_pool().await).with_timeout(Duration::from_millis(200));
        let order = NewOrder::new(
            UserId::new(1),
            vec![NewOrderItem::new(ProductId::new(10), 1, Money::from_cents(500))],
        );

        assert!(matches!(ledger.place(order).await, Err(LedgerError::Timeout)));
        assert!(matches!(
            ledger.get(OrderId::new(1)).await,
            Err(LedgerError::Timeout)
        ));
    }
}
