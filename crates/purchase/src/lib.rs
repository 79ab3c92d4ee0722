//! Purchase transaction coordinator.
//!
//! A purchase runs as one datastore transaction:
//! 1. Create a pending order for the buyer
//! 2. Reserve stock for the product
//! 3. Append a line item carrying the price read at reservation
//!
//! Any failure before commit rolls back every write made by the attempt.

pub mod coordinator;
pub mod retry;

pub use coordinator::{PurchaseCoordinator, PurchaseReceipt, PurchaseRequest};
pub use retry::RetryPolicy;
