//! Checkout error types.

use cart::CartError;
use common::{OrderId, UserId};
use ledger::LedgerError;
use thiserror::Error;

/// Errors surfaced by checkout and order operations.
///
/// Notification failures never appear here; they are logged by the fan-out
/// worker.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The target user's cart has no lines; nothing was written.
    #[error("Cart is empty for user {0}")]
    EmptyCart(UserId),

    /// The cart cannot form a valid order, e.g. its total does not fit in
    /// cents. Nothing was written.
    #[error("Invalid order: {0}")]
    InvalidOrder(#[source] LedgerError),

    /// Writing the order failed. The write was rolled back as a unit.
    #[error("Order persist failure: {0}")]
    OrderPersistFailure(#[source] LedgerError),

    /// Reading or deleting orders failed.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Cart store error while loading the cart.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The caller may not act on this order.
    #[error("User {caller} may not modify order {order_id}")]
    Forbidden { caller: UserId, order_id: OrderId },

    /// User directory lookup failed.
    #[error("Directory error: {0}")]
    Directory(#[from] sqlx::Error),

    /// User directory lookup did not answer in time.
    #[error("Directory lookup timed out")]
    DirectoryTimeout,
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
