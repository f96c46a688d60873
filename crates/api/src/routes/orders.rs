//! Order read endpoint.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId};
use serde::Serialize;
use store::{Order, OrderStatus, Session, Store};

use crate::AppState;
use crate::auth::Principal;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub status: OrderStatus,
    pub total: Money,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<OrderLineResponse>,
}

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
    pub total_price: Option<Money>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            lines: order
                .lines
                .iter()
                .map(|line| OrderLineResponse {
                    product_id: line.product_id,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    total_price: line.total_price(),
                })
                .collect(),
            id: order.id,
            status: order.status,
            total: order.total,
            transaction_id: order.transaction_id,
            created_at: order.created_at,
        }
    }
}

/// GET /orders/{id} — an order owned by the caller.
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid order ID: {id}")))?;

    let mut session = state.store.begin().await?;
    let order = state.orders.get(&mut session, order_id).await;
    session.rollback().await?;
    let order = order?;

    // Other users' orders are indistinguishable from missing ones.
    if order.user_id != principal.user_id {
        return Err(ApiError::NotFound(format!("Order not found: {order_id}")));
    }

    Ok(Json(order.into()))
}
