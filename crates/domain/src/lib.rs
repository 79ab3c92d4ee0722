//! Domain layer for the storefront engine.
//!
//! This crate provides the services the purchase coordinator and the
//! boundary call into:
//! - [`CatalogService`] for categories, products and stock reservation
//! - [`UserDirectory`] for the idempotent user upsert
//! - [`OrderLedger`] for orders, line items and status changes

pub mod catalog;
pub mod error;
pub mod ledger;
pub mod users;
pub mod validate;

pub use catalog::{CatalogService, NewProduct};
pub use error::{DomainError, Result, ValidationError};
pub use ledger::{OrderLedger, StatusPolicy};
pub use users::UserDirectory;
pub use validate::MAX_QUANTITY;
