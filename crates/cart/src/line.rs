//! Cart lines and their keys.

use common::{Money, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::CartError;

const KEY_PREFIX: &str = "cart";

/// Identifies one cart line: `cart:{user_id}:{product_id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CartKey {
    pub user_id: UserId,
    pub product_id: ProductId,
}

impl CartKey {
    pub fn new(user_id: UserId, product_id: ProductId) -> Self {
        Self {
            user_id,
            product_id,
        }
    }

    /// Scan pattern matching every line of one user.
    pub fn user_pattern(user_id: UserId) -> String {
        format!("{KEY_PREFIX}:{user_id}:*")
    }

    /// Scan pattern matching every cart line.
    pub fn all_pattern() -> String {
        format!("{KEY_PREFIX}:*")
    }
}

impl std::fmt::Display for CartKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{KEY_PREFIX}:{}:{}", self.user_id, self.product_id)
    }
}

impl std::str::FromStr for CartKey {
    type Err = CartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| CartError::Malformed {
            key: s.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = s.split(':');
        if parts.next() != Some(KEY_PREFIX) {
            return Err(malformed("missing cart prefix"));
        }
        let user_id = parts
            .next()
            .ok_or_else(|| malformed("missing user id"))?
            .parse::<UserId>()
            .map_err(|e| malformed(&e.to_string()))?;
        let product_id = parts
            .next()
            .ok_or_else(|| malformed("missing product id"))?
            .parse::<ProductId>()
            .map_err(|e| malformed(&e.to_string()))?;
        if parts.next().is_some() {
            return Err(malformed("trailing segments"));
        }

        Ok(Self::new(user_id, product_id))
    }
}

/// One (user, product) entry of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i64,
    /// Catalog price at the time this line was last written.
    pub price: Money,
}

impl CartLine {
    pub fn key(&self) -> CartKey {
        CartKey::new(self.user_id, self.product_id)
    }

    /// Returns quantity * price, or `None` if it does not fit.
    pub fn line_total(&self) -> Option<Money> {
        self.price.checked_multiply(self.quantity)
    }
}
