//! Shared types for the storefront order & inventory engine.

mod money;
mod status;
mod types;

pub use money::Money;
pub use status::{OrderStatus, UnknownStatus};
pub use types::{CategoryId, ExternalId, OrderId, OrderItemId, ProductId, UserId};
