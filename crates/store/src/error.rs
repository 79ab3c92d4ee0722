use common::{OrderId, OrderStatus, ProductId};
use thiserror::Error;

/// SQLSTATE codes that indicate contention or a timeout rather than a bad request.
const TRANSIENT_SQLSTATES: &[&str] = &[
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "55P03", // lock_not_available (lock_timeout)
    "57014", // query_canceled (statement_timeout)
];

/// Errors that can occur when interacting with the datastore.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness constraint was violated.
    #[error("{entity} with {field} '{value}' already exists")]
    Duplicate {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    /// The record cannot be deleted because other records still reference it.
    #[error("{entity} {id} is still referenced by {referenced_by}")]
    Referenced {
        entity: &'static str,
        id: String,
        referenced_by: &'static str,
    },

    /// Not enough stock on hand to satisfy a reservation.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// The order status changed underneath a compare-and-set update.
    #[error("Order {order_id} is no longer {expected}: found {actual}")]
    StatusConflict {
        order_id: OrderId,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    /// Contention or timeout; the whole operation may be retried.
    #[error("Transient datastore failure: {0}")]
    Transient(String),

    /// A value does not fit the column it is written to.
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: String },

    /// A stored value could not be mapped back into the domain model.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns true if retrying the whole operation from scratch may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Transient(_) | StoreError::StatusConflict { .. }
        )
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let transient = match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
            sqlx::Error::Database(db_err) => db_err
                .code()
                .is_some_and(|code| TRANSIENT_SQLSTATES.iter().any(|state| *state == code)),
            _ => false,
        };

        if transient {
            StoreError::Transient(err.to_string())
        } else {
            StoreError::Database(err)
        }
    }
}

/// Result type for datastore operations.
pub type Result<T> = std::result::Result<T, StoreError>;
