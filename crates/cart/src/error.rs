//! Cart error types.

use common::{ProductId, UserId};
use thiserror::Error;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The product does not exist in the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// No cart line exists for the given user and product.
    #[error("Cart line not found for user {user_id}, product {product_id}")]
    LineNotFound {
        user_id: UserId,
        product_id: ProductId,
    },

    /// Quantities must be at least one.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// A stored key or value could not be decoded.
    #[error("Malformed cart entry {key}: {reason}")]
    Malformed { key: String, reason: String },

    /// The key-value store did not answer in time.
    #[error("Cart store timed out")]
    Timeout,

    /// Key-value store error.
    #[error("Cart store error: {0}")]
    Store(#[from] ::redis::RedisError),

    /// Catalog lookup error.
    #[error("Price lookup failed: {0}")]
    Catalog(#[from] sqlx::Error),
}

/// Convenience type alias for cart results.
pub type Result<T> = std::result::Result<T, CartError>;
