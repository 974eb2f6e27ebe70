//! Checkout: converts a cart into an order and fans out notifications.
//!
//! The orchestrator runs on the caller's task up to and including the cart
//! clear. Notification fan-out is handed to [`NotificationFanout`], a
//! background worker with its own shutdown, so the response never waits on
//! the broker.

pub mod directory;
pub mod error;
pub mod fanout;
pub mod orchestrator;

pub use directory::{InMemoryUserDirectory, PgUserDirectory, UserDirectory};
pub use error::{CheckoutError, Result};
pub use fanout::{NotificationFanout, OrderPlaced, admin_order_email, order_placed_sms};
pub use orchestrator::{CheckoutOrchestrator, CheckoutReceipt};
