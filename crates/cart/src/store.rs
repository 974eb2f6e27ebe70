use async_trait::async_trait;
use common::{Money, UserId};

use crate::{CartKey, CartLine, Result};

/// Storage for cart lines.
///
/// Lines have no expiry; they live until removed explicitly or consumed by
/// checkout. All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Adds `quantity` to the line and overwrites its price snapshot.
    ///
    /// Creates the line when absent. The increment and the price write are
    /// applied atomically, so concurrent adds to the same key never lose
    /// an increment. Returns the line as stored afterwards.
    async fn increment(&self, key: CartKey, quantity: i64, price: Money) -> Result<CartLine>;

    /// Reads a single line.
    async fn get(&self, key: CartKey) -> Result<Option<CartLine>>;

    /// Overwrites the quantity of an existing line, keeping its price.
    ///
    /// Returns None (and writes nothing) if the line does not exist.
    async fn set_quantity(&self, key: CartKey, quantity: i64) -> Result<Option<CartLine>>;

    /// Lists all lines of one user.
    async fn list_user(&self, user_id: UserId) -> Result<Vec<CartLine>>;

    /// Lists every line of every user.
    async fn list_all(&self) -> Result<Vec<CartLine>>;

    /// Deletes a line. Removing an absent line is not an error.
    async fn remove(&self, key: CartKey) -> Result<()>;

    /// Takes `quantity` off a line in one atomic step and deletes the line
    /// when nothing is left. Returns the remaining quantity; an absent line
    /// yields zero.
    ///
    /// Units added after `quantity` was read survive the subtraction.
    async fn subtract(&self, key: CartKey, quantity: i64) -> Result<i64>;
}
