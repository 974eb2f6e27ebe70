//! Checkout and order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use ledger::{Order, OrderLedger};
use serde::{Deserialize, Serialize};

use ::cart::{CartStore, PriceOracle};

use super::AppState;
use super::cart::{MessageResponse, TargetQuery};
use super::identity::Caller;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CheckoutRequest {
    /// Honoured for admins only.
    #[serde(default)]
    pub user_id: Option<UserId>,
}

// -- Response types --

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub order_id: OrderId,
    pub total: String,
    pub status: String,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub user_id: UserId,
    pub total: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: ProductId,
    pub quantity: i64,
    pub price: String,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            total: order.total.to_string(),
            status: order.status.to_string(),
            created_at: order.created_at,
            items: order
                .items
                .into_iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    price: item.price.to_string(),
                })
                .collect(),
        }
    }
}

// -- Handlers --

/// POST /orders: check out the cart.
///
/// The body is optional; without one the caller's own cart is checked out.
/// Responds once the order is written and the cart cleared; notifications
/// go out in the background.
#[tracing::instrument(skip(state, body), fields(caller = %caller.user_id))]
pub async fn place<S, O, L>(
    State(state): State<Arc<AppState<S, O, L>>>,
    Caller(caller): Caller,
    body: Option<Json<CheckoutRequest>>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError>
where
    S: CartStore + 'static,
    O: PriceOracle + 'static,
    L: OrderLedger + 'static,
{
    let target = body.and_then(|Json(req)| req.user_id);
    let receipt = state.checkout.checkout(&caller, target).await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            order_id: receipt.order_id,
            total: receipt.total.to_string(),
            status: receipt.status.to_string(),
        }),
    ))
}

/// GET /orders: orders of the caller, or of `user_id` for admins.
#[tracing::instrument(skip(state), fields(caller = %caller.user_id))]
pub async fn list<S, O, L>(
    State(state): State<Arc<AppState<S, O, L>>>,
    Caller(caller): Caller,
    Query(query): Query<TargetQuery>,
) -> Result<Json<Vec<OrderResponse>>, ApiError>
where
    S: CartStore + 'static,
    O: PriceOracle + 'static,
    L: OrderLedger + 'static,
{
    let orders = state.checkout.orders_for(&caller, query.user_id).await?;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

/// DELETE /orders/{id}
#[tracing::instrument(skip(state), fields(caller = %caller.user_id))]
pub async fn delete<S, O, L>(
    State(state): State<Arc<AppState<S, O, L>>>,
    Caller(caller): Caller,
    Path(order_id): Path<OrderId>,
) -> Result<Json<MessageResponse>, ApiError>
where
    S: CartStore + 'static,
    O: PriceOracle + 'static,
    L: OrderLedger + 'static,
{
    state.checkout.delete_order(&caller, order_id).await?;
    Ok(Json(MessageResponse {
        message: "order deleted",
    }))
}
