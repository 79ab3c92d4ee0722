use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    CategoryId, ExternalId, Money, OrderId, OrderItemId, OrderStatus, ProductId, UserId,
};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::model::{Category, Order, OrderItem, Product, ProductChanges, User, UserProfile};
use crate::store::{Store, StoreTransaction};
use crate::{Result, StoreError};

/// Connection pool settings for [`PostgresStore::connect`].
#[derive(Debug, Clone)]
pub struct PostgresStoreOptions {
    pub max_connections: u32,
    /// How long to wait for a free connection before failing as transient.
    pub acquire_timeout: Duration,
    /// Applied per connection as both `statement_timeout` and `lock_timeout`.
    pub statement_timeout: Duration,
}

impl Default for PostgresStoreOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
            statement_timeout: Duration::from_secs(5),
        }
    }
}

/// PostgreSQL-backed datastore implementation.
///
/// Stock reservation is a single conditional `UPDATE`, so concurrent
/// purchases are serialized on the product row by the database itself,
/// across any number of processes sharing the database.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool with the given settings.
    pub async fn connect(url: &str, options: &PostgresStoreOptions) -> Result<Self> {
        let timeout_ms = options.statement_timeout.as_millis().to_string();
        let connect_options = url
            .parse::<PgConnectOptions>()?
            .options([
                ("statement_timeout", timeout_ms.as_str()),
                ("lock_timeout", timeout_ms.as_str()),
            ]);

        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout)
            .connect_with(connect_options)
            .await?;

        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn violated_constraint(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint(),
        _ => None,
    }
}

fn to_db_quantity(quantity: u32) -> Result<i32> {
    i32::try_from(quantity).map_err(|_| StoreError::OutOfRange {
        field: "quantity",
        value: quantity.to_string(),
    })
}

fn from_db_quantity(quantity: i32) -> Result<u32> {
    u32::try_from(quantity)
        .map_err(|_| StoreError::Corrupt(format!("negative quantity {quantity}")))
}

fn row_to_user(row: PgRow) -> Result<User> {
    Ok(User {
        id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
        external_id: ExternalId::new(row.try_get("external_id")?),
        username: row.try_get("username")?,
        full_name: row.try_get("full_name")?,
        is_admin: row.try_get("is_admin")?,
    })
}

fn row_to_category(row: PgRow) -> Result<Category> {
    Ok(Category {
        id: CategoryId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
    })
}

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        quantity: from_db_quantity(row.try_get("quantity")?)?,
        category_id: CategoryId::from_uuid(row.try_get::<Uuid, _>("category_id")?),
    })
}

fn row_to_order(row: PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        status: status
            .parse()
            .map_err(|e: common::UnknownStatus| StoreError::Corrupt(e.to_string()))?,
    })
}

fn row_to_order_item(row: PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        id: OrderItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        quantity: from_db_quantity(row.try_get("quantity")?)?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
    })
}

#[async_trait]
impl Store for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTransaction { tx }))
    }

    async fn upsert_user(&self, profile: UserProfile) -> Result<User> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (id, external_id, username, full_name, is_admin)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (external_id) DO UPDATE SET
                username = EXCLUDED.username,
                full_name = EXCLUDED.full_name,
                is_admin = users.is_admin OR EXCLUDED.is_admin
            RETURNING id, external_id, username, full_name, is_admin
            "#,
        )
        .bind(UserId::new().as_uuid())
        .bind(profile.external_id.as_i64())
        .bind(&profile.username)
        .bind(&profile.full_name)
        .bind(profile.is_admin)
        .fetch_one(&self.pool)
        .await?;

        row_to_user(row)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        sqlx::query(
            r#"
            SELECT id, external_id, username, full_name, is_admin
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .map(row_to_user)
        .transpose()
    }

    async fn find_user_by_external_id(&self, external_id: ExternalId) -> Result<Option<User>> {
        sqlx::query(
            r#"
            SELECT id, external_id, username, full_name, is_admin
            FROM users
            WHERE external_id = $1
            "#,
        )
        .bind(external_id.as_i64())
        .fetch_optional(&self.pool)
        .await?
        .map(row_to_user)
        .transpose()
    }

    async fn set_user_admin(&self, id: UserId, is_admin: bool) -> Result<User> {
        let row = sqlx::query(
            r#"
            UPDATE users SET is_admin = $2
            WHERE id = $1
            RETURNING id, external_id, username, full_name, is_admin
            "#,
        )
        .bind(id.as_uuid())
        .bind(is_admin)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found("User", id))?;

        row_to_user(row)
    }

    async fn insert_category(&self, category: Category) -> Result<Category> {
        let row = sqlx::query(
            r#"
            INSERT INTO categories (id, name)
            VALUES ($1, $2)
            RETURNING id, name
            "#,
        )
        .bind(category.id.as_uuid())
        .bind(&category.name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if violated_constraint(&e) == Some("unique_category_name") {
                return StoreError::Duplicate {
                    entity: "Category",
                    field: "name",
                    value: category.name.clone(),
                };
            }
            StoreError::from(e)
        })?;

        row_to_category(row)
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>> {
        sqlx::query("SELECT id, name FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(row_to_category)
            .transpose()
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query("SELECT id, name FROM categories ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(row_to_category).collect()
    }

    async fn delete_category(&self, id: CategoryId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM categories WHERE id = $1 FOR UPDATE")
                .bind(id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(StoreError::not_found("Category", id));
        }

        let referenced = || StoreError::Referenced {
            entity: "Category",
            id: id.to_string(),
            referenced_by: "OrderItem",
        };

        let in_use: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM order_items oi
                JOIN products p ON p.id = oi.product_id
                WHERE p.category_id = $1
            )
            "#,
        )
        .bind(id.as_uuid())
        .fetch_one(&mut *tx)
        .await?;
        if in_use {
            return Err(referenced());
        }

        sqlx::query("DELETE FROM products WHERE category_id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if violated_constraint(&e) == Some("order_items_product_id_fkey") {
                    return referenced();
                }
                StoreError::from(e)
            })?;

        sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn insert_product(&self, product: Product) -> Result<Product> {
        let row = sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price_cents, quantity, category_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, description, price_cents, quantity, category_id
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(to_db_quantity(product.quantity)?)
        .bind(product.category_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if violated_constraint(&e) == Some("products_category_id_fkey") {
                return StoreError::not_found("Category", product.category_id);
            }
            StoreError::from(e)
        })?;

        row_to_product(row)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        sqlx::query(
            r#"
            SELECT id, name, description, price_cents, quantity, category_id
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .map(row_to_product)
        .transpose()
    }

    async fn list_products(&self, category_id: Option<CategoryId>) -> Result<Vec<Product>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, price_cents, quantity, category_id
            FROM products
            WHERE $1::uuid IS NULL OR category_id = $1
            ORDER BY name ASC, id ASC
            "#,
        )
        .bind(category_id.map(|id| id.as_uuid()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_product).collect()
    }

    async fn update_product(&self, id: ProductId, changes: ProductChanges) -> Result<Product> {
        let quantity = changes.quantity.map(to_db_quantity).transpose()?;

        let row = sqlx::query(
            r#"
            UPDATE products SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                price_cents = COALESCE($4, price_cents),
                quantity = COALESCE($5, quantity),
                category_id = COALESCE($6, category_id)
            WHERE id = $1
            RETURNING id, name, description, price_cents, quantity, category_id
            "#,
        )
        .bind(id.as_uuid())
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(changes.price.map(|price| price.cents()))
        .bind(quantity)
        .bind(changes.category_id.map(|id| id.as_uuid()))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if violated_constraint(&e) == Some("products_category_id_fkey") {
                let category_id = changes
                    .category_id
                    .map(|id| id.to_string())
                    .unwrap_or_default();
                return StoreError::not_found("Category", category_id);
            }
            StoreError::from(e)
        })?
        .ok_or_else(|| StoreError::not_found("Product", id))?;

        row_to_product(row)
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if violated_constraint(&e) == Some("order_items_product_id_fkey") {
                    return StoreError::Referenced {
                        entity: "Product",
                        id: id.to_string(),
                        referenced_by: "OrderItem",
                    };
                }
                StoreError::from(e)
            })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Product", id));
        }
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        sqlx::query("SELECT id, user_id, created_at, status FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(row_to_order)
            .transpose()
    }

    async fn list_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, quantity, unit_price_cents
            FROM order_items
            WHERE order_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_order_item).collect()
    }

    async fn list_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, created_at, status
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_order).collect()
    }

    async fn set_order_status(&self, id: OrderId, status: OrderStatus) -> Result<Order> {
        let row = sqlx::query(
            r#"
            UPDATE orders SET status = $2
            WHERE id = $1
            RETURNING id, user_id, created_at, status
            "#,
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_order(row),
            None => Err(StoreError::not_found("Order", id)),
        }
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        new: OrderStatus,
    ) -> Result<Order> {
        let row = sqlx::query(
            r#"
            UPDATE orders SET status = $3
            WHERE id = $1 AND status = $2
            RETURNING id, user_id, created_at, status
            "#,
        )
        .bind(id.as_uuid())
        .bind(expected.as_str())
        .bind(new.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return row_to_order(row);
        }

        match self.get_order(id).await? {
            Some(order) => Err(StoreError::StatusConflict {
                order_id: id,
                expected,
                actual: order.status,
            }),
            None => Err(StoreError::not_found("Order", id)),
        }
    }

    async fn delete_order(&self, id: OrderId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Order", id));
        }

        tx.commit().await?;
        Ok(())
    }
}

/// Transaction scope over a pooled connection. Dropping it uncommitted
/// rolls back on the server.
struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn get_user(&mut self, id: UserId) -> Result<Option<User>> {
        sqlx::query(
            r#"
            SELECT id, external_id, username, full_name, is_admin
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?
        .map(row_to_user)
        .transpose()
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        sqlx::query("SELECT id, user_id, created_at, status FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?
            .map(row_to_order)
            .transpose()
    }

    async fn insert_order(&mut self, order: Order) -> Result<Order> {
        let row = sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, created_at, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, created_at, status
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.created_at)
        .bind(order.status.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if violated_constraint(&e) == Some("orders_user_id_fkey") {
                return StoreError::not_found("User", order.user_id);
            }
            StoreError::from(e)
        })?;

        row_to_order(row)
    }

    async fn reserve_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<Product> {
        let requested = to_db_quantity(quantity)?;

        // The WHERE guard is re-evaluated after waiting on a concurrent
        // reservation's row lock, so stock can never go below zero.
        let row = sqlx::query(
            r#"
            UPDATE products SET quantity = quantity - $2
            WHERE id = $1 AND quantity >= $2
            RETURNING id, name, description, price_cents, quantity, category_id
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(requested)
        .fetch_optional(&mut *self.tx)
        .await?;

        if let Some(row) = row {
            return row_to_product(row);
        }

        let available: Option<i32> =
            sqlx::query_scalar("SELECT quantity FROM products WHERE id = $1")
                .bind(product_id.as_uuid())
                .fetch_optional(&mut *self.tx)
                .await?;

        match available {
            Some(available) => Err(StoreError::InsufficientStock {
                product_id,
                requested: quantity,
                available: from_db_quantity(available)?,
            }),
            None => Err(StoreError::not_found("Product", product_id)),
        }
    }

    async fn insert_order_item(&mut self, item: OrderItem) -> Result<OrderItem> {
        let row = sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, product_id, quantity, unit_price_cents)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, order_id, product_id, quantity, unit_price_cents
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.order_id.as_uuid())
        .bind(item.product_id.as_uuid())
        .bind(to_db_quantity(item.quantity)?)
        .bind(item.unit_price.cents())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| match violated_constraint(&e) {
            Some("order_items_order_id_fkey") => StoreError::not_found("Order", item.order_id),
            Some("order_items_product_id_fkey") => {
                StoreError::not_found("Product", item.product_id)
            }
            _ => StoreError::from(e),
        })?;

        row_to_order_item(row)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        tracing::debug!("transaction rolled back");
        Ok(())
    }
}
