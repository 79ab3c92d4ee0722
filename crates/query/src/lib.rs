//! Read path for orders.
//!
//! - [`OrderQueryService`] lists a user's orders and loads one order with its lines
//! - [`OrderDetails`] carries the order total, recomputed from the line items on every read

pub mod details;
pub mod service;

pub use details::{OrderDetails, OrderLine};
pub use service::OrderQueryService;
