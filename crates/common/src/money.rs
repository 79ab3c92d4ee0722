use serde::{Deserialize, Serialize};

/// Money amount represented in cents to avoid floating point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = 10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a new Money amount from a whole-unit value.
    pub fn from_units(units: i64) -> Self {
        Self {
            cents: units * 100,
        }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the whole-unit portion.
    pub fn units(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the cents portion (remainder after whole units).
    pub fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Adds another amount, returning None on overflow.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.cents.checked_add(other.cents).map(Money::from_cents)
    }

    /// Multiplies by a quantity, returning None on overflow.
    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Money::from_cents)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-{}.{:02}", self.units().abs(), self.cents_part())
        } else {
            write!(f, "{}.{:02}", self.units(), self.cents_part())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_units_converts_to_cents() {
        assert_eq!(Money::from_units(100).cents(), 10_000);
    }

    #[test]
    fn display_formats_two_decimals() {
        assert_eq!(Money::from_cents(1050).to_string(), "10.50");
        assert_eq!(Money::from_cents(7).to_string(), "0.07");
        assert_eq!(Money::from_cents(-1050).to_string(), "-10.50");
    }

    #[test]
    fn checked_multiply_scales_by_quantity() {
        let price = Money::from_cents(1999);
        assert_eq!(price.checked_multiply(3), Some(Money::from_cents(5997)));
        assert_eq!(price.checked_multiply(0), Some(Money::zero()));
    }

    #[test]
    fn checked_arithmetic_reports_overflow() {
        let huge = Money::from_cents(i64::MAX);
        assert_eq!(huge.checked_multiply(2), None);
        assert_eq!(huge.checked_add(Money::from_cents(1)), None);
    }

    #[test]
    fn negative_detection() {
        assert!(Money::from_cents(-1).is_negative());
        assert!(!Money::zero().is_negative());
        assert!(Money::zero().is_zero());
    }

    #[test]
    fn serializes_as_cents() {
        let json = serde_json::to_string(&Money::from_cents(2500)).unwrap();
        assert_eq!(json, "2500");
    }
}
