//! HTTP API for carts, checkout and orders.
//!
//! Handlers are generic over the cart store, price oracle and order ledger
//! so the same router runs against Redis/PostgreSQL in production and the
//! in-memory implementations in tests. Structured logging comes from
//! tracing, metrics from the Prometheus exporter.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use cart::{CartService, CartStore, InMemoryCartStore, InMemoryPriceOracle, PriceOracle};
use checkout::{InMemoryUserDirectory, NotificationFanout};
use ledger::{InMemoryOrderLedger, OrderLedger};
use metrics_exporter_prometheus::PrometheusHandle;
use notification::InMemoryPublisher;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, O, L>(state: Arc<AppState<S, O, L>>, metrics_handle: PrometheusHandle) -> Router
where
    S: CartStore + 'static,
    O: PriceOracle + 'static,
    L: OrderLedger + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/cart", post(routes::cart::add::<S, O, L>))
        .route("/cart", get(routes::cart::view::<S, O, L>))
        .route("/cart/{product_id}", put(routes::cart::update::<S, O, L>))
        .route("/cart/{product_id}", delete(routes::cart::remove::<S, O, L>))
        .route("/orders", post(routes::orders::place::<S, O, L>))
        .route("/orders", get(routes::orders::list::<S, O, L>))
        .route("/orders/{id}", delete(routes::orders::delete::<S, O, L>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// State backed entirely by in-memory components.
pub type InMemoryState = AppState<InMemoryCartStore, InMemoryPriceOracle, InMemoryOrderLedger>;

/// Handles onto the in-memory collaborators behind [`create_default_state`],
/// for seeding and inspection.
#[derive(Clone)]
pub struct InMemoryHandles {
    pub oracle: InMemoryPriceOracle,
    pub store: InMemoryCartStore,
    pub ledger: InMemoryOrderLedger,
    pub directory: InMemoryUserDirectory,
    pub publisher: InMemoryPublisher,
}

/// Creates application state with in-memory stores and publisher.
///
/// Must be called inside a Tokio runtime; it spawns the fan-out worker.
pub fn create_default_state() -> (Arc<InMemoryState>, InMemoryHandles) {
    let handles = InMemoryHandles {
        oracle: InMemoryPriceOracle::new(),
        store: InMemoryCartStore::new(),
        ledger: InMemoryOrderLedger::new(),
        directory: InMemoryUserDirectory::new(),
        publisher: InMemoryPublisher::new(),
    };

    let cart = Arc::new(CartService::new(
        handles.store.clone(),
        handles.oracle.clone(),
    ));
    let fanout = Arc::new(NotificationFanout::spawn(
        Arc::new(handles.directory.clone()),
        Arc::new(handles.publisher.clone()),
    ));
    let state = Arc::new(AppState::new(cart, handles.ledger.clone(), fanout));

    (state, handles)
}
