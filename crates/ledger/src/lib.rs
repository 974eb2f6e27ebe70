//! Order ledger: durable record of completed checkouts.
//!
//! An order header and its items are always written as one unit of work.
//! [`PostgresOrderLedger`] wraps both inserts in a single transaction, so a
//! failed item insert never leaves an orphaned header behind.

pub mod error;
pub mod memory;
pub mod order;
pub mod postgres;
pub mod store;

pub use common::{Money, OrderId, ProductId, UserId};
pub use error::{LedgerError, Result};
pub use memory::InMemoryOrderLedger;
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, OrderStatus};
pub use postgres::PostgresOrderLedger;
pub use store::OrderLedger;
