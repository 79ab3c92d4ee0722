//! Order details read model.

use common::{Money, UserId};
use domain::ValidationError;
use store::{Order, OrderItem};

/// A line item with its computed `quantity × unit_price`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub item: OrderItem,
    pub line_total: Money,
}

/// An order together with its line items and total.
///
/// The total is derived from the frozen unit prices, so later product
/// price changes never affect it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDetails {
    pub order: Order,
    pub lines: Vec<OrderLine>,
    pub total: Money,
}

impl OrderDetails {
    /// Builds the details, failing with `TotalOverflow` if a line or the sum overflows.
    pub fn new(order: Order, items: Vec<OrderItem>) -> Result<Self, ValidationError> {
        let mut total = Money::zero();
        let mut lines = Vec::with_capacity(items.len());

        for item in items {
            let line_total = item.line_total().ok_or(ValidationError::TotalOverflow)?;
            total = total
                .checked_add(line_total)
                .ok_or(ValidationError::TotalOverflow)?;
            lines.push(OrderLine { item, line_total });
        }

        Ok(Self {
            order,
            lines,
            total,
        })
    }

    /// Returns true if the order belongs to `user_id`.
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.order.user_id == user_id
    }

    /// Total number of units across all lines.
    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.item.quantity)).sum()
    }
}
