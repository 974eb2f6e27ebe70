//! Shared types for the cart-to-order pipeline.
//!
//! Every crate in the workspace speaks in terms of these identifiers,
//! the cent-based [`Money`] amount and the [`CallerIdentity`] handed over by
//! the authentication layer.

pub mod identity;
pub mod ids;
pub mod money;

pub use identity::{CallerIdentity, Role, RoleParseError};
pub use ids::{OrderId, ProductId, UserId};
pub use money::Money;
