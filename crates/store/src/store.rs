use async_trait::async_trait;
use common::{CategoryId, ExternalId, OrderId, OrderStatus, ProductId, UserId};

use crate::Result;
use crate::model::{Category, Order, OrderItem, Product, ProductChanges, User, UserProfile};

/// Core trait for datastore implementations.
///
/// Single-record operations run in their own implicit transaction. Multi-record
/// writes that must be all-or-nothing go through [`Store::begin`].
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a transaction scope.
    ///
    /// The returned handle must be finished with [`StoreTransaction::commit`]
    /// or [`StoreTransaction::rollback`]; dropping it uncommitted discards
    /// every write made through it.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;

    /// Creates the user if the external id is unknown, otherwise refreshes
    /// its name fields. Admin is granted but never revoked by an upsert.
    async fn upsert_user(&self, profile: UserProfile) -> Result<User>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>>;

    async fn find_user_by_external_id(&self, external_id: ExternalId) -> Result<Option<User>>;

    /// Sets the admin flag. Fails with `NotFound` if the user does not exist.
    async fn set_user_admin(&self, id: UserId, is_admin: bool) -> Result<User>;

    /// Inserts a category. Fails with `Duplicate` if the name is taken.
    async fn insert_category(&self, category: Category) -> Result<Category>;

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>>;

    /// Lists all categories ordered by name.
    async fn list_categories(&self) -> Result<Vec<Category>>;

    /// Deletes a category together with its products.
    ///
    /// Fails with `Referenced` if any of its products appears on an order.
    async fn delete_category(&self, id: CategoryId) -> Result<()>;

    /// Inserts a product. Fails with `NotFound` if the category does not exist.
    async fn insert_product(&self, product: Product) -> Result<Product>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Lists products ordered by name, optionally restricted to one category.
    async fn list_products(&self, category_id: Option<CategoryId>) -> Result<Vec<Product>>;

    /// Applies a partial update and returns the updated product.
    async fn update_product(&self, id: ProductId, changes: ProductChanges) -> Result<Product>;

    /// Deletes a product. Fails with `Referenced` if it appears on an order.
    async fn delete_product(&self, id: ProductId) -> Result<()>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists the line items of an order in insertion order.
    async fn list_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>>;

    /// Lists a user's orders, newest first.
    async fn list_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Overwrites an order's status. Fails with `NotFound` if the order does not exist.
    async fn set_order_status(&self, id: OrderId, status: OrderStatus) -> Result<Order>;

    /// Moves an order from `expected` to `new` status.
    ///
    /// Fails with `StatusConflict` if the stored status is no longer `expected`.
    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        new: OrderStatus,
    ) -> Result<Order>;

    /// Deletes an order together with its line items.
    async fn delete_order(&self, id: OrderId) -> Result<()>;
}

/// An open transaction scope.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn get_user(&mut self, id: UserId) -> Result<Option<User>>;

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Inserts an order. Fails with `NotFound` if the user does not exist.
    async fn insert_order(&mut self, order: Order) -> Result<Order>;

    /// Atomically decrements on-hand stock if at least `quantity` is available.
    ///
    /// Returns the product as it is after the decrement, with the price that
    /// was current at the moment of reservation. Fails with `NotFound` or
    /// `InsufficientStock` without touching the stock.
    async fn reserve_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<Product>;

    /// Inserts a line item. Fails with `NotFound` if the order or product is missing.
    async fn insert_order_item(&mut self, item: OrderItem) -> Result<OrderItem>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Extension trait providing convenience methods for stores.
#[async_trait]
pub trait StoreExt: Store {
    /// Reserves stock in a transaction of its own.
    async fn reserve_stock(&self, product_id: ProductId, quantity: u32) -> Result<Product> {
        let mut tx = self.begin().await?;
        match tx.reserve_stock(product_id, quantity).await {
            Ok(product) => {
                tx.commit().await?;
                Ok(product)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }
}

// Blanket implementation for all Store implementations
impl<T: Store + ?Sized> StoreExt for T {}
