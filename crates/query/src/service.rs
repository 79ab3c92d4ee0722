//! Order query service.

use common::{OrderId, UserId};
use domain::{DomainError, Result};
use store::{Order, Store};

use crate::details::OrderDetails;

/// Read-only access to orders. Reads are plain snapshot reads.
pub struct OrderQueryService<S: Store> {
    store: S,
}

impl<S: Store> OrderQueryService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Loads an order with its lines and a freshly computed total.
    ///
    /// Ownership is not checked here; see [`OrderDetails::is_owned_by`].
    #[tracing::instrument(skip(self))]
    pub async fn get_order_details(&self, order_id: OrderId) -> Result<OrderDetails> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "Order",
                id: order_id.to_string(),
            })?;

        let items = self.store.list_order_items(order_id).await?;
        let details = OrderDetails::new(order, items)?;

        tracing::debug!(lines = details.lines.len(), total = %details.total, "order details loaded");
        Ok(details)
    }

    /// Lists a user's orders, newest first. Empty if the user has none.
    #[tracing::instrument(skip(self))]
    pub async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        Ok(self.store.list_orders_by_user(user_id).await?)
    }

    /// Lists a user's orders with their lines and totals, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_details_by_user(&self, user_id: UserId) -> Result<Vec<OrderDetails>> {
        let orders = self.store.list_orders_by_user(user_id).await?;

        let mut details = Vec::with_capacity(orders.len());
        for order in orders {
            let items = self.store.list_order_items(order.id).await?;
            details.push(OrderDetails::new(order, items)?);
        }
        Ok(details)
    }
}
