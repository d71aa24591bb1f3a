//! Monetary amounts backed by an exact decimal.

use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A monetary amount in the store currency.
///
/// Arithmetic is exact; rounding only happens where [`Money::round_cents`]
/// is called explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Creates an amount from a mantissa and scale, e.g. `Money::new(2999, 2)` is 29.99.
    pub fn new(mantissa: i64, scale: u32) -> Self {
        Self(Decimal::new(mantissa, scale))
    }

    /// Creates an amount of whole currency units.
    pub fn from_major(units: i64) -> Self {
        Self(Decimal::from(units))
    }

    pub fn from_decimal(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Rounds to two decimal places, midpoint away from zero.
    pub fn round_cents(self) -> Self {
        Self(self.0.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Multiplies by an arbitrary decimal factor (rates, percentages).
    pub fn scale(self, factor: Decimal) -> Self {
        Self(self.0 * factor)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl std::str::FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<Decimal>().map(Self)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Mul<u32> for Money {
    type Output = Money;

    fn mul(self, quantity: u32) -> Money {
        Money(self.0 * Decimal::from(quantity))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uses_scale() {
        assert_eq!(Money::new(2999, 2).to_string(), "29.99");
        assert_eq!(Money::new(-150, 2).to_string(), "-1.50");
        assert_eq!(Money::new(500, 0), Money::from_major(500));
    }

    #[test]
    fn arithmetic_is_exact() {
        let a: Money = "0.10".parse().unwrap();
        let b: Money = "0.20".parse().unwrap();
        assert_eq!(a + b, "0.30".parse().unwrap());
        assert_eq!(Money::from_major(100) * 3, Money::from_major(300));
    }

    #[test]
    fn round_cents_is_midpoint_away_from_zero() {
        assert_eq!(Money::new(99995, 3).round_cents(), Money::new(10000, 2));
        assert_eq!(Money::new(12344, 3).round_cents(), Money::new(1234, 2));
    }

    #[test]
    fn sum_and_min_max() {
        let total: Money = [Money::from_major(1), Money::new(250, 2)].into_iter().sum();
        assert_eq!(total, Money::new(350, 2));
        assert_eq!(total.min(Money::from_major(2)), Money::from_major(2));
        assert_eq!(total.max(Money::from_major(2)), total);
    }

    #[test]
    fn serializes_as_string() {
        let json = serde_json::to_string(&Money::new(37799, 2)).unwrap();
        assert_eq!(json, "\"377.99\"");
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Money::new(37799, 2));
    }
}
