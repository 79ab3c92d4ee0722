//! Domain error types.

use common::{OrderStatus, ProductId};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A field is malformed or out of range.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Not enough stock on hand for the requested quantity.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// Contention or a datastore timeout. Retrying the whole operation may succeed.
    #[error("Conflict or transient failure: {0}")]
    ConflictOrTransient(String),

    /// The datastore failed for a reason retrying will not fix.
    #[error("Datastore error: {0}")]
    Store(StoreError),
}

impl DomainError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns true if the failed operation can be retried from scratch.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::ConflictOrTransient(_))
    }
}

/// Malformed or out-of-range input, and rule violations the caller can fix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    EmptyName { field: &'static str },

    #[error("Price must not be negative")]
    NegativePrice,

    #[error("Quantity must be positive, got {quantity}")]
    InvalidQuantity { quantity: u32 },

    #[error("Quantity {quantity} exceeds the maximum of {max}")]
    QuantityTooLarge { quantity: u32, max: u32 },

    #[error("Category '{name}' already exists")]
    DuplicateCategory { name: String },

    #[error("Product {id} appears on existing orders")]
    ProductInUse { id: String },

    #[error("Category {id} has products on existing orders")]
    CategoryInUse { id: String },

    #[error("Cannot change order status from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("Unknown order status: {0}")]
    UnknownStatus(String),

    #[error("Order total overflows")]
    TotalOverflow,
}

impl From<common::UnknownStatus> for ValidationError {
    fn from(err: common::UnknownStatus) -> Self {
        ValidationError::UnknownStatus(err.0)
    }
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => DomainError::NotFound { entity, id },
            StoreError::Duplicate {
                entity: "Category",
                value,
                ..
            } => ValidationError::DuplicateCategory { name: value }.into(),
            StoreError::Referenced {
                entity: "Product",
                id,
                ..
            } => ValidationError::ProductInUse { id }.into(),
            StoreError::Referenced {
                entity: "Category",
                id,
                ..
            } => ValidationError::CategoryInUse { id }.into(),
            StoreError::InsufficientStock {
                product_id,
                requested,
                available,
            } => DomainError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            StoreError::OutOfRange { field, value } => match value.parse::<u32>() {
                Ok(quantity) if field == "quantity" => ValidationError::QuantityTooLarge {
                    quantity,
                    max: crate::validate::MAX_QUANTITY,
                }
                .into(),
                _ => DomainError::Store(StoreError::OutOfRange { field, value }),
            },
            err if err.is_transient() => DomainError::ConflictOrTransient(err.to_string()),
            err => DomainError::Store(err),
        }
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
