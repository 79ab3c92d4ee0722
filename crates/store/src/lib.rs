//! Datastore boundary for the storefront engine.
//!
//! - [`Store`] for single-record reads and writes
//! - [`StoreTransaction`] for multi-record writes that commit or roll back as one unit
//! - [`InMemoryStore`] for tests and single-process use
//! - [`PostgresStore`] backed by sqlx

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use model::{Category, Order, OrderItem, Product, ProductChanges, User, UserProfile};
pub use postgres::{PostgresStore, PostgresStoreOptions};
pub use store::{Store, StoreExt, StoreTransaction};
