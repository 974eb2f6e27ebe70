//! Route handlers and the shared application state.

pub mod cart;
pub mod identity;
pub mod orders;
pub mod system;

use std::sync::Arc;

use ::cart::{CartService, CartStore, PriceOracle};
use checkout::{CheckoutOrchestrator, NotificationFanout};
use ledger::OrderLedger;

/// Shared application state accessible from all handlers.
pub struct AppState<S, O, L>
where
    S: CartStore,
    O: PriceOracle,
    L: OrderLedger,
{
    pub cart: Arc<CartService<S, O>>,
    pub checkout: CheckoutOrchestrator<S, O, L>,
    pub fanout: Arc<NotificationFanout>,
}

impl<S, O, L> AppState<S, O, L>
where
    S: CartStore,
    O: PriceOracle,
    L: OrderLedger,
{
    /// Wires the checkout orchestrator around an existing cart service.
    pub fn new(cart: Arc<CartService<S, O>>, ledger: L, fanout: Arc<NotificationFanout>) -> Self {
        let checkout = CheckoutOrchestrator::new(cart.clone(), ledger, fanout.clone());
        Self {
            cart,
            checkout,
            fanout,
        }
    }
}
