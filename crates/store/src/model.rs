//! Records persisted by the datastore.

use chrono::{DateTime, Utc};
use common::{CategoryId, ExternalId, Money, OrderId, OrderItemId, OrderStatus, ProductId, UserId};
use serde::{Deserialize, Serialize};

/// A storefront user, keyed internally by [`UserId`] and externally by the
/// messaging platform identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub external_id: ExternalId,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub is_admin: bool,
}

impl User {
    /// Name to greet the user by: full name, then username, then the external id.
    pub fn display_name(&self) -> String {
        self.full_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or(self.username.as_deref().filter(|name| !name.is_empty()))
            .map(str::to_string)
            .unwrap_or_else(|| self.external_id.to_string())
    }
}

/// Input for the user upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub external_id: ExternalId,
    pub username: Option<String>,
    pub full_name: Option<String>,
    /// Applied when the user is created; an existing user is never demoted.
    pub is_admin: bool,
}

impl UserProfile {
    pub fn new(
        external_id: ExternalId,
        username: Option<String>,
        full_name: Option<String>,
    ) -> Self {
        Self {
            external_id,
            username,
            full_name,
            is_admin: false,
        }
    }

    pub fn with_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    /// Quantity on hand.
    pub quantity: u32,
    pub category_id: CategoryId,
}

/// Partial update of a product. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub quantity: Option<u32>,
    pub category_id: Option<CategoryId>,
}

impl ProductChanges {
    pub fn apply_to(&self, product: &mut Product) {
        if let Some(ref name) = self.name {
            product.name = name.clone();
        }
        if let Some(ref description) = self.description {
            product.description = Some(description.clone());
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(quantity) = self.quantity {
            product.quantity = quantity;
        }
        if let Some(category_id) = self.category_id {
            product.category_id = category_id;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
}

impl Order {
    /// Creates a new pending order stamped with the current time.
    pub fn pending(user_id: UserId) -> Self {
        Self {
            id: OrderId::new(),
            user_id,
            created_at: Utc::now(),
            status: OrderStatus::Pending,
        }
    }
}

/// A line item. The unit price is a copy taken at purchase time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderItem {
    pub fn new(order_id: OrderId, product_id: ProductId, quantity: u32, unit_price: Money) -> Self {
        Self {
            id: OrderItemId::new(),
            order_id,
            product_id,
            quantity,
            unit_price,
        }
    }

    /// `quantity × unit_price`, or None on overflow.
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_multiply(self.quantity)
    }
}
