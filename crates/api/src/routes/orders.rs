//! Order read endpoints and the admin status change.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{OrderId, OrderStatus};
use domain::ValidationError;
use query::OrderDetails;
use serde::{Deserialize, Serialize};
use store::{Order, Store};

use super::parse_id;
use crate::auth::{AdminCaller, Caller};
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub status: String,
    pub created_at: String,
    pub items: Vec<OrderItemResponse>,
    pub total_quantity: u64,
    pub total_cents: i64,
    pub total: String,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub id: String,
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

#[derive(Serialize)]
pub struct OrderStatusResponse {
    pub id: String,
    pub status: String,
}

impl From<OrderDetails> for OrderResponse {
    fn from(details: OrderDetails) -> Self {
        let items = details
            .lines
            .iter()
            .map(|line| OrderItemResponse {
                id: line.item.id.to_string(),
                product_id: line.item.product_id.to_string(),
                quantity: line.item.quantity,
                unit_price_cents: line.item.unit_price.cents(),
                line_total_cents: line.line_total.cents(),
            })
            .collect();

        Self {
            id: details.order.id.to_string(),
            user_id: details.order.user_id.to_string(),
            status: details.order.status.to_string(),
            created_at: details.order.created_at.to_rfc3339(),
            items,
            total_quantity: details.total_quantity(),
            total_cents: details.total.cents(),
            total: details.total.to_string(),
        }
    }
}

impl From<Order> for OrderStatusResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            status: order.status.to_string(),
        }
    }
}

// -- Handlers --

/// GET /orders — the caller's orders, newest first.
#[tracing::instrument(skip(state, caller), fields(user_id = %caller.0.id))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.queries.list_details_by_user(caller.0.id).await?;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

/// GET /orders/{id} — one of the caller's orders with its total.
#[tracing::instrument(skip(state, caller), fields(user_id = %caller.0.id))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order")?;
    let details = state.queries.get_order_details(order_id).await?;

    if !details.is_owned_by(caller.0.id) {
        return Err(ApiError::Forbidden(format!(
            "Order {order_id} belongs to another user"
        )));
    }

    Ok(Json(details.into()))
}

/// POST /orders/{id}/status — change an order's status.
#[tracing::instrument(skip(state, admin, req), fields(admin_id = %admin.0.id))]
pub async fn set_status<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminCaller,
    Path(id): Path<String>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<OrderStatusResponse>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order")?;
    let status: OrderStatus = req
        .status
        .parse()
        .map_err(|e: common::UnknownStatus| domain::DomainError::from(ValidationError::from(e)))?;

    let order = state.ledger.set_status(order_id, status).await?;
    Ok(Json(order.into()))
}
