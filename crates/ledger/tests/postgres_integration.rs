//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container and need Docker.
//! Run with:
//!
//! ```bash
//! cargo test -p ledger --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use ledger::{
    LedgerError, Money, NewOrder, NewOrderItem, OrderLedger, OrderStatus, PostgresOrderLedger,
    ProductId, UserId,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_orders_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh ledger with its own pool and cleared tables
async fn get_test_ledger() -> PostgresOrderLedger {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE order_items, orders RESTART IDENTITY")
        .execute(&pool)
        .await
        .unwrap();

    PostgresOrderLedger::new(pool)
}

fn sample_order(user: i64) -> NewOrder {
    NewOrder::new(
        UserId::new(user),
        vec![
            NewOrderItem::new(ProductId::new(10), 2, Money::from_cents(500)),
            NewOrderItem::new(ProductId::new(11), 1, Money::from_cents(350)),
        ],
    )
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn place_writes_header_and_items() {
    let ledger = get_test_ledger().await;

    let order = ledger.place(sample_order(1)).await.unwrap();
    assert_eq!(order.total, Money::from_cents(1350));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.items.len(), 2);

    let loaded = ledger.get(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.id, order.id);
    assert_eq!(loaded.items.len(), 2);
    assert_eq!(loaded.items[0].product_id, ProductId::new(10));
    assert_eq!(loaded.items[0].quantity, 2);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn failed_item_insert_rolls_back_header() {
    let ledger = get_test_ledger().await;

    // Rejects the second item at the database level.
    sqlx::query("ALTER TABLE order_items ADD CONSTRAINT reject_product_99 CHECK (product_id <> 99)")
        .execute(ledger.pool())
        .await
        .unwrap();

    let order = NewOrder::new(
        UserId::new(5),
        vec![
            NewOrderItem::new(ProductId::new(10), 1, Money::from_cents(500)),
            NewOrderItem::new(ProductId::new(99), 1, Money::from_cents(100)),
        ],
    );
    let result = ledger.place(order).await;

    sqlx::query("ALTER TABLE order_items DROP CONSTRAINT reject_product_99")
        .execute(ledger.pool())
        .await
        .unwrap();

    assert!(matches!(result, Err(LedgerError::Database(_))));
    let orders = ledger.orders_for_user(UserId::new(5)).await.unwrap();
    assert!(orders.is_empty());
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn orders_for_user_returns_only_owned_orders() {
    let ledger = get_test_ledger().await;
    ledger.place(sample_order(1)).await.unwrap();
    ledger.place(sample_order(2)).await.unwrap();
    ledger.place(sample_order(1)).await.unwrap();

    let orders = ledger.orders_for_user(UserId::new(1)).await.unwrap();
    assert_eq!(orders.len(), 2);
    assert!(orders.iter().all(|o| o.items.len() == 2));
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn delete_cascades_items() {
    let ledger = get_test_ledger().await;
    let order = ledger.place(sample_order(1)).await.unwrap();

    assert!(ledger.delete(order.id).await.unwrap());
    assert!(ledger.get(order.id).await.unwrap().is_none());

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_items")
        .fetch_one(ledger.pool())
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}
