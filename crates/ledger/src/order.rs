//! Order header and line item records.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::{LedgerError, Result};

/// Lifecycle status of an order.
///
/// Checkout only ever creates `Pending` orders. Statuses written by other
/// services are carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum OrderStatus {
    Pending,
    Other(String),
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Other(s) => s,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for OrderStatus {
    fn from(s: String) -> Self {
        if s == "Pending" {
            OrderStatus::Pending
        } else {
            OrderStatus::Other(s)
        }
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_string()
    }
}

/// A line of a persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i64,
    /// Unit price frozen at the time the cart line was last written.
    pub price: Money,
}

impl OrderItem {
    /// Returns quantity * price, or `None` if it does not fit.
    pub fn line_total(&self) -> Option<Money> {
        self.price.checked_multiply(self.quantity)
    }
}

/// A persisted order with its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub total: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

/// An item to be written as part of a [`NewOrder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: i64,
    pub price: Money,
}

impl NewOrderItem {
    pub fn new(product_id: ProductId, quantity: i64, price: Money) -> Self {
        Self {
            product_id,
            quantity,
            price,
        }
    }

    pub fn line_total(&self) -> Option<Money> {
        self.price.checked_multiply(self.quantity)
    }
}

/// An order that has not been written yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    pub fn new(user_id: UserId, items: Vec<NewOrderItem>) -> Self {
        Self { user_id, items }
    }

    /// Sum of quantity * price over all items.
    ///
    /// Fails with `TotalOutOfRange` when a line total or the sum does not
    /// fit in cents.
    pub fn total(&self) -> Result<Money> {
        self.items
            .iter()
            .map(NewOrderItem::line_total)
            .try_fold(Money::zero(), |acc, line| acc.checked_add(line?))
            .ok_or(LedgerError::TotalOutOfRange)
    }

    /// Checks the order before any write is attempted.
    pub fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(LedgerError::EmptyOrder);
        }
        for item in &self.items {
            if item.quantity < 1 {
                return Err(LedgerError::InvalidItem {
                    product_id: item.product_id,
                    reason: format!("quantity must be at least 1, got {}", item.quantity),
                });
            }
            if item.price.is_negative() {
                return Err(LedgerError::InvalidItem {
                    product_id: item.product_id,
                    reason: format!("price must not be negative, got {}", item.price),
                });
            }
        }
        self.total().map(|_| ())
    }
}
