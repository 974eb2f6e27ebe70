//! Shopping cart backed by a key-value store.
//!
//! This crate provides:
//! - [`CartStore`]: per-(user, product) line storage with an atomic
//!   "increment quantity, set price" primitive
//! - [`PriceOracle`]: read-only catalog lookup consulted on every write
//! - [`CartService`]: the cart operations used by the HTTP layer and the
//!   checkout orchestrator
//!
//! Prices are never taken from the client. Every add re-reads the catalog
//! price and overwrites the snapshot held on the line.

pub mod error;
pub mod line;
pub mod memory;
pub mod oracle;
pub mod redis_store;
pub mod service;
pub mod store;

pub use error::{CartError, Result};
pub use line::{CartKey, CartLine};
pub use memory::InMemoryCartStore;
pub use oracle::{InMemoryPriceOracle, PgPriceOracle, PriceOracle};
pub use redis_store::RedisCartStore;
pub use service::{CartService, ClearReport, MAX_LINE_QUANTITY};
pub use store::CartStore;
