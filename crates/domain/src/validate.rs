//! Field validation shared by the services.

use common::Money;

use crate::error::ValidationError;

/// Largest quantity the datastore can hold.
pub const MAX_QUANTITY: u32 = i32::MAX as u32;

/// Trims a name and rejects it if nothing is left.
pub fn name(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName { field });
    }
    Ok(trimmed.to_string())
}

pub fn price(price: Money) -> Result<Money, ValidationError> {
    if price.is_negative() {
        return Err(ValidationError::NegativePrice);
    }
    Ok(price)
}

/// Quantity on hand: zero is allowed.
pub fn stock_quantity(quantity: u32) -> Result<u32, ValidationError> {
    if quantity > MAX_QUANTITY {
        return Err(ValidationError::QuantityTooLarge {
            quantity,
            max: MAX_QUANTITY,
        });
    }
    Ok(quantity)
}

/// Quantity being purchased or recorded on a line item: must be positive.
pub fn line_quantity(quantity: u32) -> Result<u32, ValidationError> {
    if quantity == 0 {
        return Err(ValidationError::InvalidQuantity { quantity });
    }
    stock_quantity(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed() {
        assert_eq!(name("name", "  Books ").unwrap(), "Books");
        assert_eq!(
            name("name", "   "),
            Err(ValidationError::EmptyName { field: "name" })
        );
    }

    #[test]
    fn negative_price_rejected() {
        assert!(price(Money::zero()).is_ok());
        assert_eq!(
            price(Money::from_cents(-1)),
            Err(ValidationError::NegativePrice)
        );
    }

    #[test]
    fn line_quantity_bounds() {
        assert!(matches!(
            line_quantity(0),
            Err(ValidationError::InvalidQuantity { quantity: 0 })
        ));
        assert_eq!(line_quantity(1), Ok(1));
        assert_eq!(line_quantity(MAX_QUANTITY), Ok(MAX_QUANTITY));
        assert!(matches!(
            line_quantity(MAX_QUANTITY + 1),
            Err(ValidationError::QuantityTooLarge { .. })
        ));
    }

    #[test]
    fn stock_quantity_allows_zero() {
        assert_eq!(stock_quantity(0), Ok(0));
    }
}
