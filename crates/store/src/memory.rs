use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{CategoryId, ExternalId, OrderId, OrderStatus, ProductId, UserId};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::model::{Category, Order, OrderItem, Product, ProductChanges, User, UserProfile};
use crate::store::{Store, StoreTransaction};
use crate::{Result, StoreError};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<UserId, User>,
    categories: HashMap<CategoryId, Category>,
    products: HashMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
    order_items: Vec<OrderItem>,
}

impl MemoryState {
    fn insert_order(&mut self, order: Order) -> Result<Order> {
        if !self.users.contains_key(&order.user_id) {
            return Err(StoreError::not_found("User", order.user_id));
        }
        self.orders.insert(order.id, order.clone());
        Ok(order)
    }

    fn reserve_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<Product> {
        let product = self
            .products
            .get_mut(&product_id)
            .ok_or_else(|| StoreError::not_found("Product", product_id))?;

        if product.quantity < quantity {
            return Err(StoreError::InsufficientStock {
                product_id,
                requested: quantity,
                available: product.quantity,
            });
        }

        product.quantity -= quantity;
        Ok(product.clone())
    }

    fn insert_order_item(&mut self, item: OrderItem) -> Result<OrderItem> {
        if !self.orders.contains_key(&item.order_id) {
            return Err(StoreError::not_found("Order", item.order_id));
        }
        if !self.products.contains_key(&item.product_id) {
            return Err(StoreError::not_found("Product", item.product_id));
        }
        self.order_items.push(item.clone());
        Ok(item)
    }

    fn is_product_referenced(&self, product_id: ProductId) -> bool {
        self.order_items
            .iter()
            .any(|item| item.product_id == product_id)
    }
}

/// Switches used by tests to simulate a failure in the middle of a transaction.
#[derive(Debug, Default)]
struct FaultInjection {
    fail_on_item_insert: AtomicBool,
    fail_on_rollback: AtomicBool,
}

/// In-memory datastore implementation.
///
/// Transactions take the store's write lock for their whole lifetime and work
/// on a private copy of the state, which replaces the shared state on commit.
/// Transactions are therefore fully serialized.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
    faults: Arc<FaultInjection>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every line-item insert inside a transaction fail with a transient error.
    pub fn set_fail_on_item_insert(&self, fail: bool) {
        self.faults.fail_on_item_insert.store(fail, Ordering::SeqCst);
    }

    /// Makes every explicit rollback report a transient error. Staged writes
    /// are still discarded.
    pub fn set_fail_on_rollback(&self, fail: bool) {
        self.faults.fail_on_rollback.store(fail, Ordering::SeqCst);
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns the total number of line items stored.
    pub async fn order_item_count(&self) -> usize {
        self.state.read().await.order_items.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let guard = self.state.clone().write_owned().await;
        let staged = MemoryState::clone(&guard);
        Ok(Box::new(InMemoryTransaction {
            guard,
            staged,
            faults: self.faults.clone(),
        }))
    }

    async fn upsert_user(&self, profile: UserProfile) -> Result<User> {
        let mut state = self.state.write().await;

        if let Some(user) = state
            .users
            .values_mut()
            .find(|u| u.external_id == profile.external_id)
        {
            user.username = profile.username;
            user.full_name = profile.full_name;
            user.is_admin |= profile.is_admin;
            return Ok(user.clone());
        }

        let user = User {
            id: UserId::new(),
            external_id: profile.external_id,
            username: profile.username,
            full_name: profile.full_name,
            is_admin: profile.is_admin,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_external_id(&self, external_id: ExternalId) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.external_id == external_id)
            .cloned())
    }

    async fn set_user_admin(&self, id: UserId, is_admin: bool) -> Result<User> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("User", id))?;
        user.is_admin = is_admin;
        Ok(user.clone())
    }

    async fn insert_category(&self, category: Category) -> Result<Category> {
        let mut state = self.state.write().await;
        if state.categories.values().any(|c| c.name == category.name) {
            return Err(StoreError::Duplicate {
                entity: "Category",
                field: "name",
                value: category.name,
            });
        }
        state.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>> {
        Ok(self.state.read().await.categories.get(&id).cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let state = self.state.read().await;
        let mut categories: Vec<_> = state.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn delete_category(&self, id: CategoryId) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.categories.contains_key(&id) {
            return Err(StoreError::not_found("Category", id));
        }

        let product_ids: Vec<ProductId> = state
            .products
            .values()
            .filter(|p| p.category_id == id)
            .map(|p| p.id)
            .collect();

        if product_ids
            .iter()
            .any(|product_id| state.is_product_referenced(*product_id))
        {
            return Err(StoreError::Referenced {
                entity: "Category",
                id: id.to_string(),
                referenced_by: "OrderItem",
            });
        }

        for product_id in product_ids {
            state.products.remove(&product_id);
        }
        state.categories.remove(&id);
        Ok(())
    }

    async fn insert_product(&self, product: Product) -> Result<Product> {
        let mut state = self.state.write().await;
        if !state.categories.contains_key(&product.category_id) {
            return Err(StoreError::not_found("Category", product.category_id));
        }
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn list_products(&self, category_id: Option<CategoryId>) -> Result<Vec<Product>> {
        let state = self.state.read().await;
        let mut products: Vec<_> = state
            .products
            .values()
            .filter(|p| category_id.is_none_or(|id| p.category_id == id))
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(products)
    }

    async fn update_product(&self, id: ProductId, changes: ProductChanges) -> Result<Product> {
        let mut state = self.state.write().await;
        if let Some(category_id) = changes.category_id
            && !state.categories.contains_key(&category_id)
        {
            return Err(StoreError::not_found("Category", category_id));
        }

        let product = state
            .products
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Product", id))?;
        changes.apply_to(product);
        Ok(product.clone())
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.products.contains_key(&id) {
            return Err(StoreError::not_found("Product", id));
        }
        if state.is_product_referenced(id) {
            return Err(StoreError::Referenced {
                entity: "Product",
                id: id.to_string(),
                referenced_by: "OrderItem",
            });
        }
        state.products.remove(&id);
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn list_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let state = self.state.read().await;
        Ok(state
            .order_items
            .iter()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn list_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn set_order_status(&self, id: OrderId, status: OrderStatus) -> Result<Order> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Order", id))?;

        order.status = status;
        Ok(order.clone())
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        new: OrderStatus,
    ) -> Result<Order> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Order", id))?;

        if order.status != expected {
            return Err(StoreError::StatusConflict {
                order_id: id,
                expected,
                actual: order.status,
            });
        }

        order.status = new;
        Ok(order.clone())
    }

    async fn delete_order(&self, id: OrderId) -> Result<()> {
        let mut state = self.state.write().await;
        if state.orders.remove(&id).is_none() {
            return Err(StoreError::not_found("Order", id));
        }
        state.order_items.retain(|item| item.order_id != id);
        Ok(())
    }
}

/// Transaction over a private copy of the in-memory state.
struct InMemoryTransaction {
    guard: OwnedRwLockWriteGuard<MemoryState>,
    staged: MemoryState,
    faults: Arc<FaultInjection>,
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn get_user(&mut self, id: UserId) -> Result<Option<User>> {
        Ok(self.staged.users.get(&id).cloned())
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.staged.orders.get(&id).cloned())
    }

    async fn insert_order(&mut self, order: Order) -> Result<Order> {
        self.staged.insert_order(order)
    }

    async fn reserve_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<Product> {
        self.staged.reserve_stock(product_id, quantity)
    }

    async fn insert_order_item(&mut self, item: OrderItem) -> Result<OrderItem> {
        if self.faults.fail_on_item_insert.load(Ordering::SeqCst) {
            return Err(StoreError::Transient(
                "injected failure on line item insert".to_string(),
            ));
        }
        self.staged.insert_order_item(item)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryTransaction {
            mut guard, staged, ..
        } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        if self.faults.fail_on_rollback.load(Ordering::SeqCst) {
            return Err(StoreError::Transient(
                "injected failure on rollback".to_string(),
            ));
        }
        Ok(())
    }
}
