//! Order ledger: order creation, line items and status changes.

use common::{Money, OrderId, OrderStatus, ProductId, UserId};
use store::{Order, OrderItem, Store, StoreTransaction};

use crate::error::{DomainError, Result, ValidationError};
use crate::validate;

/// How [`OrderLedger::set_status`] treats the order's current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusPolicy {
    /// Any status may replace any other; the order only has to exist.
    #[default]
    Overwrite,
    /// Only moves allowed by [`OrderStatus::can_transition_to`], written as a
    /// compare-and-set on the status read beforehand.
    TransitionTable,
}

/// Service owning orders and their line items.
pub struct OrderLedger<S: Store> {
    store: S,
    status_policy: StatusPolicy,
}

impl<S: Store> OrderLedger<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            status_policy: StatusPolicy::default(),
        }
    }

    pub fn with_status_policy(mut self, status_policy: StatusPolicy) -> Self {
        self.status_policy = status_policy;
        self
    }

    /// Creates a pending order for an existing user.
    pub async fn create_order(&self, user_id: UserId) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        match self.create_order_in(tx.as_mut(), user_id).await {
            Ok(order) => {
                tx.commit().await?;
                Ok(order)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Creates a pending order stamped with the current time inside the
    /// caller's transaction. Fails with `NotFound` if the user does not exist.
    #[tracing::instrument(skip(self, tx))]
    pub async fn create_order_in(
        &self,
        tx: &mut dyn StoreTransaction,
        user_id: UserId,
    ) -> Result<Order> {
        let order = tx.insert_order(Order::pending(user_id)).await?;
        tracing::debug!(order_id = %order.id, "order created");
        Ok(order)
    }

    /// Appends a line item to an existing order.
    pub async fn append_item(
        &self,
        order_id: OrderId,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<OrderItem> {
        let mut tx = self.store.begin().await?;
        match self
            .append_item_in(tx.as_mut(), order_id, product_id, quantity, unit_price)
            .await
        {
            Ok(item) => {
                tx.commit().await?;
                Ok(item)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Appends a line item inside the caller's transaction. No stock is touched.
    #[tracing::instrument(skip(self, tx))]
    pub async fn append_item_in(
        &self,
        tx: &mut dyn StoreTransaction,
        order_id: OrderId,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<OrderItem> {
        let quantity = validate::line_quantity(quantity)?;
        let unit_price = validate::price(unit_price)?;

        let item = tx
            .insert_order_item(OrderItem::new(order_id, product_id, quantity, unit_price))
            .await?;
        Ok(item)
    }

    /// Changes an order's status. Fails with `NotFound` if the order is missing.
    ///
    /// Under [`StatusPolicy::TransitionTable`] a disallowed move fails with
    /// `InvalidStatusTransition`, and losing a race to another transition
    /// fails with `ConflictOrTransient`.
    #[tracing::instrument(skip(self))]
    pub async fn set_status(&self, order_id: OrderId, new_status: OrderStatus) -> Result<Order> {
        match self.status_policy {
            StatusPolicy::Overwrite => {
                let updated = self.store.set_order_status(order_id, new_status).await?;
                tracing::info!(to = %new_status, "order status set");
                Ok(updated)
            }
            StatusPolicy::TransitionTable => self.transition_status(order_id, new_status).await,
        }
    }

    async fn transition_status(&self, order_id: OrderId, new_status: OrderStatus) -> Result<Order> {
        let order = self.get_order(order_id).await?;

        if !order.status.can_transition_to(new_status) {
            return Err(ValidationError::InvalidStatusTransition {
                from: order.status,
                to: new_status,
            }
            .into());
        }

        let updated = self
            .store
            .update_order_status(order_id, order.status, new_status)
            .await?;

        tracing::info!(from = %order.status, to = %new_status, "order status changed");
        Ok(updated)
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", order_id))
    }

    /// Lists the line items of an order in insertion order.
    pub async fn list_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        Ok(self.store.list_order_items(order_id).await?)
    }

    /// Lists a user's orders, newest first.
    pub async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        Ok(self.store.list_orders_by_user(user_id).await?)
    }

    /// Deletes an order and its line items. Reserved stock is not returned.
    #[tracing::instrument(skip(self))]
    pub async fn delete_order(&self, order_id: OrderId) -> Result<()> {
        self.store.delete_order(order_id).await?;
        tracing::info!("order deleted");
        Ok(())
    }
}
