//! Cart endpoints and the checkout trigger.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use common::{Money, OrderId, ProductId};
use serde::{Deserialize, Serialize};
use store::{CartItem, Session, Store};

use crate::AppState;
use crate::auth::Principal;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    /// Signed delta; negative values reduce the line.
    pub quantity: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct CartResponse {
    pub items: Vec<CartItemResponse>,
    /// Sum of quantity times current price, in cents. Not a quote; `null`
    /// when the amount does not fit in cents.
    pub estimated_total: Option<Money>,
}

#[derive(Serialize)]
pub struct CartItemResponse {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub stock: i64,
    pub subtotal: Option<Money>,
}

impl From<&CartItem> for CartItemResponse {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product.id,
            name: item.product.name.clone(),
            quantity: item.quantity,
            unit_price: item.product.price,
            stock: item.product.stock,
            subtotal: item.subtotal(),
        }
    }
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub message: String,
    pub order_id: OrderId,
    /// Amount charged, in cents.
    pub total_paid: Money,
}

// -- Handlers --

/// POST /cart — adds a signed quantity delta to one cart line.
pub async fn add<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<AddToCartRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    if req.quantity == 0 {
        return Err(ApiError::BadRequest("quantity must not be zero".to_string()));
    }

    let mut session = state.store.begin().await?;
    state
        .cart
        .add_or_adjust(&mut session, principal.user_id, req.product_id, req.quantity)
        .await?;
    session.commit().await?;

    Ok(Json(MessageResponse {
        message: "Added to cart".to_string(),
    }))
}

/// GET /cart — the caller's cart with current product data.
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<CartResponse>, ApiError> {
    let mut session = state.store.begin().await?;
    let items = state.cart.get(&mut session, principal.user_id).await;
    session.rollback().await?;
    let items = items?;

    Ok(Json(CartResponse {
        estimated_total: Money::checked_sum(items.iter().map(CartItem::subtotal)),
        items: items.iter().map(CartItemResponse::from).collect(),
    }))
}

/// DELETE /cart/{product_id} — removes one line.
pub async fn remove<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(principal): Extension<Principal>,
    Path(product_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let product_id: ProductId = product_id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid product ID".to_string()))?;

    let mut session = state.store.begin().await?;
    state
        .cart
        .remove_line(&mut session, principal.user_id, product_id)
        .await?;
    session.commit().await?;

    Ok(Json(MessageResponse {
        message: "Item removed".to_string(),
    }))
}

/// POST /cart/checkout — turns the cart into a paid order.
pub async fn checkout<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(principal): Extension<Principal>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    let order = state.checkout.checkout(principal.user_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            message: "Order placed successfully".to_string(),
            order_id: order.id,
            total_paid: order.total,
        }),
    ))
}
