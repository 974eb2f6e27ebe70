//! Cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{ProductId, UserId};
use ledger::OrderLedger;
use serde::{Deserialize, Serialize};

use ::cart::{CartLine, CartStore, PriceOracle};

use super::AppState;
use super::identity::Caller;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    pub quantity: i64,
    /// Honoured for admins only.
    #[serde(default)]
    pub user_id: Option<UserId>,
}

#[derive(Deserialize)]
pub struct UpdateCartRequest {
    pub quantity: i64,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct TargetQuery {
    pub user_id: Option<UserId>,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartLineResponse {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub price: String,
}

impl From<CartLine> for CartLineResponse {
    fn from(line: CartLine) -> Self {
        Self {
            user_id: line.user_id,
            product_id: line.product_id,
            quantity: line.quantity,
            price: line.price.to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

// -- Handlers --

/// POST /cart: add a product, or add to the quantity already in the cart.
#[tracing::instrument(skip(state, req), fields(caller = %caller.user_id))]
pub async fn add<S, O, L>(
    State(state): State<Arc<AppState<S, O, L>>>,
    Caller(caller): Caller,
    Json(req): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<CartLineResponse>), ApiError>
where
    S: CartStore + 'static,
    O: PriceOracle + 'static,
    L: OrderLedger + 'static,
{
    let user_id = caller.resolve_target(req.user_id);
    let line = state
        .cart
        .add_or_increment(user_id, req.product_id, req.quantity)
        .await?;

    Ok((StatusCode::CREATED, Json(line.into())))
}

/// GET /cart: own cart, or every cart for admins.
#[tracing::instrument(skip(state), fields(caller = %caller.user_id))]
pub async fn view<S, O, L>(
    State(state): State<Arc<AppState<S, O, L>>>,
    Caller(caller): Caller,
) -> Result<Json<Vec<CartLineResponse>>, ApiError>
where
    S: CartStore + 'static,
    O: PriceOracle + 'static,
    L: OrderLedger + 'static,
{
    let lines = state.cart.view(&caller).await?;
    Ok(Json(lines.into_iter().map(Into::into).collect()))
}

/// PUT /cart/{product_id}: overwrite the quantity of an existing line.
#[tracing::instrument(skip(state, req), fields(caller = %caller.user_id))]
pub async fn update<S, O, L>(
    State(state): State<Arc<AppState<S, O, L>>>,
    Caller(caller): Caller,
    Path(product_id): Path<ProductId>,
    Json(req): Json<UpdateCartRequest>,
) -> Result<Json<CartLineResponse>, ApiError>
where
    S: CartStore + 'static,
    O: PriceOracle + 'static,
    L: OrderLedger + 'static,
{
    let user_id = caller.resolve_target(req.user_id);
    let line = state
        .cart
        .update(user_id, product_id, req.quantity)
        .await?;

    Ok(Json(line.into()))
}

/// DELETE /cart/{product_id}
#[tracing::instrument(skip(state), fields(caller = %caller.user_id))]
pub async fn remove<S, O, L>(
    State(state): State<Arc<AppState<S, O, L>>>,
    Caller(caller): Caller,
    Path(product_id): Path<ProductId>,
    Query(query): Query<TargetQuery>,
) -> Result<Json<MessageResponse>, ApiError>
where
    S: CartStore + 'static,
    O: PriceOracle + 'static,
    L: OrderLedger + 'static,
{
    let user_id = caller.resolve_target(query.user_id);
    state.cart.remove(user_id, product_id).await?;

    Ok(Json(MessageResponse {
        message: "cart item removed",
    }))
}
