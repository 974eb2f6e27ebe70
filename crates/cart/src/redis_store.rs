use std::collections::HashMap;
use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use ::redis::aio::ConnectionManager;
use ::redis::{AsyncCommands, RedisResult, Script};
use async_trait::async_trait;
use common::{Money, UserId};

use crate::{CartError, CartKey, CartLine, CartStore, Result};

const QUANTITY_FIELD: &str = "quantity";
const PRICE_FIELD: &str = "price_cents";

/// Overwrites the quantity only when the line exists; returns the stored
/// price, or nil when nothing was written.
static SET_QUANTITY_IF_EXISTS: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
        if redis.call('EXISTS', KEYS[1]) == 1 then
            redis.call('HSET', KEYS[1], 'quantity', ARGV[1])
            return redis.call('HGET', KEYS[1], 'price_cents')
        end
        return false
        "#,
    )
});

/// Takes ARGV[1] units off the line, deleting it when none are left;
/// returns the remaining quantity.
static SUBTRACT_QUANTITY: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
        local current = redis.call('HGET', KEYS[1], 'quantity')
        if not current then
            return 0
        end
        local left = tonumber(current) - tonumber(ARGV[1])
        if left <= 0 then
            redis.call('DEL', KEYS[1])
            return 0
        end
        redis.call('HSET', KEYS[1], 'quantity', left)
        return left
        "#,
    )
});

/// Redis-backed cart store.
///
/// Each line is a hash at `cart:{user_id}:{product_id}` holding the
/// `quantity` and `price_cents` fields. Every call is bounded by the
/// configured timeout.
#[derive(Clone)]
pub struct RedisCartStore {
    conn: ConnectionManager,
    timeout: Duration,
}

impl RedisCartStore {
    /// Connects to Redis and creates a new cart store.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        let client = ::redis::Client::open(url)?;
        let conn = tokio::time::timeout(timeout, client.get_connection_manager())
            .await
            .map_err(|_| CartError::Timeout)??;
        Ok(Self::new(conn, timeout))
    }

    /// Creates a cart store from an existing connection manager.
    pub fn new(conn: ConnectionManager, timeout: Duration) -> Self {
        Self { conn, timeout }
    }

    async fn bounded<T>(&self, fut: impl Future<Output = RedisResult<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| CartError::Timeout)?
            .map_err(CartError::from)
    }

    fn decode_line(key: CartKey, fields: &HashMap<String, String>) -> Result<CartLine> {
        let field = |name: &str| -> Result<i64> {
            fields
                .get(name)
                .ok_or_else(|| CartError::Malformed {
                    key: key.to_string(),
                    reason: format!("missing field {name}"),
                })?
                .parse::<i64>()
                .map_err(|e| CartError::Malformed {
                    key: key.to_string(),
                    reason: format!("field {name}: {e}"),
                })
        };

        Ok(CartLine {
            user_id: key.user_id,
            product_id: key.product_id,
            quantity: field(QUANTITY_FIELD)?,
            price: Money::from_cents(field(PRICE_FIELD)?),
        })
    }

    async fn scan_keys(&self, pattern: String) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        self.bounded(async move {
            let mut iter: ::redis::AsyncIter<String> = conn.scan_match(&pattern).await?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            Ok::<_, ::redis::RedisError>(keys)
        })
        .await
    }

    /// Loads every line matching a scan pattern, skipping undecodable entries.
    async fn load_matching(&self, pattern: String) -> Result<Vec<CartLine>> {
        let mut lines = Vec::new();
        for raw_key in self.scan_keys(pattern).await? {
            let key = match raw_key.parse::<CartKey>() {
                Ok(key) => key,
                Err(e) => {
                    tracing::warn!(key = %raw_key, error = %e, "skipping foreign cart key");
                    continue;
                }
            };
            match self.get(key).await {
                Ok(Some(line)) => lines.push(line),
                // Removed between the scan and the read.
                Ok(None) => {}
                Err(CartError::Malformed { key, reason }) => {
                    tracing::warn!(%key, %reason, "skipping malformed cart line");
                }
                Err(e) => return Err(e),
            }
        }
        lines.sort_by_key(CartLine::key);
        Ok(lines)
    }
}

#[async_trait]
impl CartStore for RedisCartStore {
    async fn increment(&self, key: CartKey, quantity: i64, price: Money) -> Result<CartLine> {
        let redis_key = key.to_string();
        let mut conn = self.conn.clone();

        // MULTI/EXEC: the increment and the price write land together.
        let (new_quantity, _): (i64, i64) = self
            .bounded(
                ::redis::pipe()
                    .atomic()
                    .hincr(&redis_key, QUANTITY_FIELD, quantity)
                    .hset(&redis_key, PRICE_FIELD, price.cents())
                    .query_async(&mut conn),
            )
            .await?;

        Ok(CartLine {
            user_id: key.user_id,
            product_id: key.product_id,
            quantity: new_quantity,
            price,
        })
    }

    async fn get(&self, key: CartKey) -> Result<Option<CartLine>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> =
            self.bounded(conn.hgetall(key.to_string())).await?;

        if fields.is_empty() {
            return Ok(None);
        }
        Self::decode_line(key, &fields).map(Some)
    }

    async fn set_quantity(&self, key: CartKey, quantity: i64) -> Result<Option<CartLine>> {
        let mut conn = self.conn.clone();
        let price: Option<i64> = self
            .bounded(
                SET_QUANTITY_IF_EXISTS
                    .key(key.to_string())
                    .arg(quantity)
                    .invoke_async(&mut conn),
            )
            .await?;

        Ok(price.map(|cents| CartLine {
            user_id: key.user_id,
            product_id: key.product_id,
            quantity,
            price: Money::from_cents(cents),
        }))
    }

    async fn list_user(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        self.load_matching(CartKey::user_pattern(user_id)).await
    }

    async fn list_all(&self) -> Result<Vec<CartLine>> {
        self.load_matching(CartKey::all_pattern()).await
    }

    async fn remove(&self, key: CartKey) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = self.bounded(conn.del(key.to_string())).await?;
        Ok(())
    }

    async fn subtract(&self, key: CartKey, quantity: i64) -> Result<i64> {
        let mut conn = self.conn.clone();
        self.bounded(
            SUBTRACT_QUANTITY
                .key(key.to_string())
                .arg(quantity)
                .invoke_async(&mut conn),
        )
        .await
    }
}
