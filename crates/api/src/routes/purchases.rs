//! Purchase endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::ProductId;
use purchase::{PurchaseReceipt, PurchaseRequest};
use serde::{Deserialize, Serialize};
use store::Store;

use super::parse_id;
use crate::auth::Caller;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreatePurchaseRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct PurchaseResponse {
    pub order_id: String,
    pub item_id: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub total_cents: i64,
    pub status: String,
    pub remaining_stock: u32,
}

impl TryFrom<PurchaseReceipt> for PurchaseResponse {
    type Error = ApiError;

    fn try_from(receipt: PurchaseReceipt) -> Result<Self, Self::Error> {
        let total = receipt
            .item
            .line_total()
            .ok_or_else(|| ApiError::Internal("Line total overflows".to_string()))?;

        Ok(Self {
            order_id: receipt.order.id.to_string(),
            item_id: receipt.item.id.to_string(),
            product_id: receipt.product.id.to_string(),
            product_name: receipt.product.name,
            quantity: receipt.item.quantity,
            unit_price_cents: receipt.item.unit_price.cents(),
            total_cents: total.cents(),
            status: receipt.order.status.to_string(),
            remaining_stock: receipt.product.quantity,
        })
    }
}

/// POST /purchases — buy a product as the calling user.
///
/// Retried from scratch on contention; a rejected purchase leaves no order.
#[tracing::instrument(skip(state, caller, req), fields(user_id = %caller.0.id))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Json(req): Json<CreatePurchaseRequest>,
) -> Result<(StatusCode, Json<PurchaseResponse>), ApiError> {
    let product_id: ProductId = parse_id(&req.product_id, "product")?;

    let receipt = state
        .coordinator
        .purchase_with_retry(PurchaseRequest::new(caller.0.id, product_id, req.quantity))
        .await?;

    Ok((StatusCode::CREATED, Json(PurchaseResponse::try_from(receipt)?)))
}
