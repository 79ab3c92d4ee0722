//! Catalog store: categories, products and the stock reservation primitive.

use common::{CategoryId, Money, ProductId};
use store::{Category, Product, ProductChanges, Store, StoreError, StoreTransaction};

use crate::error::{DomainError, Result};
use crate::validate;

/// Input for creating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub quantity: u32,
    pub category_id: CategoryId,
}

/// Service for catalog reads, admin mutations and stock reservation.
pub struct CatalogService<S: Store> {
    store: S,
}

impl<S: Store> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates a category. The name is trimmed and must be unique.
    #[tracing::instrument(skip(self))]
    pub async fn create_category(&self, name: &str) -> Result<Category> {
        let name = validate::name("name", name)?;
        let category = self
            .store
            .insert_category(Category {
                id: CategoryId::new(),
                name,
            })
            .await?;

        tracing::info!(category_id = %category.id, "category created");
        Ok(category)
    }

    pub async fn get_category(&self, id: CategoryId) -> Result<Category> {
        self.store
            .get_category(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Category", id))
    }

    /// Lists all categories ordered by name.
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(self.store.list_categories().await?)
    }

    /// Deletes a category together with its products.
    ///
    /// Rejected with `CategoryInUse` if any of its products is on an order.
    #[tracing::instrument(skip(self))]
    pub async fn delete_category(&self, id: CategoryId) -> Result<()> {
        self.store.delete_category(id).await?;
        tracing::info!(category_id = %id, "category deleted");
        Ok(())
    }

    /// Creates a product in an existing category.
    #[tracing::instrument(skip(self, new), fields(category_id = %new.category_id))]
    pub async fn create_product(&self, new: NewProduct) -> Result<Product> {
        let product = Product {
            id: ProductId::new(),
            name: validate::name("name", &new.name)?,
            description: new.description,
            price: validate::price(new.price)?,
            quantity: validate::stock_quantity(new.quantity)?,
            category_id: new.category_id,
        };

        self.get_category(product.category_id).await?;
        let product = self.store.insert_product(product).await?;

        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product", id))
    }

    /// Lists products ordered by name, optionally within one category.
    pub async fn list_products(&self, category_id: Option<CategoryId>) -> Result<Vec<Product>> {
        Ok(self.store.list_products(category_id).await?)
    }

    /// Applies a partial update. Only the provided fields change.
    #[tracing::instrument(skip(self, changes))]
    pub async fn update_product(&self, id: ProductId, changes: ProductChanges) -> Result<Product> {
        let changes = ProductChanges {
            name: changes
                .name
                .map(|name| validate::name("name", &name))
                .transpose()?,
            description: changes.description,
            price: changes.price.map(validate::price).transpose()?,
            quantity: changes.quantity.map(validate::stock_quantity).transpose()?,
            category_id: changes.category_id,
        };

        if let Some(category_id) = changes.category_id {
            self.get_category(category_id).await?;
        }

        let product = self.store.update_product(id, changes).await?;
        tracing::info!(product_id = %id, "product updated");
        Ok(product)
    }

    /// Deletes a product. Rejected with `ProductInUse` if it is on an order.
    #[tracing::instrument(skip(self))]
    pub async fn delete_product(&self, id: ProductId) -> Result<()> {
        self.store.delete_product(id).await?;
        tracing::info!(product_id = %id, "product deleted");
        Ok(())
    }

    /// Reserves stock in a transaction of its own.
    pub async fn reserve_stock(&self, product_id: ProductId, quantity: u32) -> Result<Product> {
        let mut tx = self.store.begin().await?;
        match self.reserve_stock_in(tx.as_mut(), product_id, quantity).await {
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

    /// Reserves stock inside the caller's transaction.
    ///
    /// Decrements on-hand stock only if at least `quantity` is available and
    /// returns the product as reserved, with the price current at that moment.
    #[tracing::instrument(skip(self, tx))]
    pub async fn reserve_stock_in(
        &self,
        tx: &mut dyn StoreTransaction,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Product> {
        let quantity = validate::line_quantity(quantity)?;

        let result = tx.reserve_stock(product_id, quantity).await;
        let outcome = match &result {
            Ok(_) => "reserved",
            Err(StoreError::InsufficientStock { .. }) => "insufficient",
            Err(StoreError::NotFound { .. }) => "not_found",
            Err(_) => "error",
        };
        metrics::counter!("stock_reservations_total", "outcome" => outcome).increment(1);

        let product = result?;
        tracing::debug!(remaining = product.quantity, "stock reserved");
        Ok(product)
    }
}
