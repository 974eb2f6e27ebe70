use thiserror::Error;

use common::{OrderId, ProductId};

/// Errors that can occur when interacting with the order ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// An order must contain at least one item.
    #[error("Order has no items")]
    EmptyOrder,

    /// An item failed validation before any write was attempted.
    #[error("Invalid item for product {product_id}: {reason}")]
    InvalidItem {
        product_id: ProductId,
        reason: String,
    },

    /// The order total does not fit in cents.
    #[error("Order total out of range")]
    TotalOutOfRange,

    /// The database did not answer in time.
    #[error("Ledger timed out")]
    Timeout,

    /// The order was not found in the ledger.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The write was rejected and the unit of work rolled back.
    #[error("Write rejected: {0}")]
    WriteRejected(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
