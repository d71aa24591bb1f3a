//! Pricing engine.
//!
//! Pure computation of cart totals. Given the same lines, coupon and
//! configuration, [`price`] always returns the same [`Totals`], so carts can be
//! re-priced after every mutation without drift.

use common::Money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::CartLine;
use crate::coupon::Coupon;

/// Rates and thresholds used by the pricing engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingConfig {
    /// Fraction of the discounted subtotal charged as tax (0.20 = 20%).
    pub tax_rate: Decimal,

    /// Discounted subtotal at or above which shipping is free.
    pub free_shipping_threshold: Money,

    /// Shipping charged below the threshold.
    pub flat_shipping_cost: Money,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(20, 2),
            free_shipping_threshold: Money::from_major(500),
            flat_shipping_cost: Money::new(2999, 2),
        }
    }
}

/// Monetary summary of a cart or order.
///
/// Invariant: `total == subtotal - discount + tax + shipping_cost`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub shipping_cost: Money,
    pub total: Money,
}

impl Totals {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Amount tax is charged on.
    pub fn taxable_base(&self) -> Money {
        self.subtotal - self.discount
    }
}

/// Sum of line subtotals.
pub fn subtotal(lines: &[CartLine]) -> Money {
    lines.iter().map(CartLine::subtotal).sum()
}

/// Computes totals for a set of lines.
///
/// `coupon` is the coupon the cart's code resolved to, if any. An inactive
/// coupon contributes no discount rather than failing, so a cart keeps pricing
/// after its coupon is switched off elsewhere. Coupon validity windows and
/// usage limits are not checked here; they gate applying a coupon and
/// checkout, not re-pricing.
pub fn price(lines: &[CartLine], coupon: Option<&Coupon>, config: &PricingConfig) -> Totals {
    if lines.is_empty() {
        return Totals::zero();
    }

    let subtotal = subtotal(lines);
    let discount = coupon
        .filter(|c| c.is_active)
        .map(|c| c.discount_for(subtotal))
        .unwrap_or(Money::ZERO);

    let taxable = subtotal - discount;
    let shipping_cost = if taxable >= config.free_shipping_threshold {
        Money::ZERO
    } else {
        config.flat_shipping_cost
    };
    let tax = taxable.scale(config.tax_rate).round_cents();

    Totals {
        subtotal,
        discount,
        tax,
        shipping_cost,
        total: taxable + tax + shipping_cost,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use common::ProductId;

    use super::*;
    use crate::coupon::DiscountKind;

    fn line(sku: &str, price: Money, quantity: u32) -> CartLine {
        CartLine::new(ProductId::new(sku), format!("Product {sku}"), sku, price, quantity)
    }

    fn coupon(kind: DiscountKind, value: i64) -> Coupon {
        let now = Utc::now();
        Coupon::new(
            "TEST",
            kind,
            Decimal::from(value),
            now - Duration::days(1),
            now + Duration::days(1),
        )
    }

    #[test]
    fn test_fixed_coupon_scenario() {
        let lines = vec![line("SKU-1", Money::from_major(100), 3)];
        let save10 = coupon(DiscountKind::FixedAmount, 10);

        let totals = price(&lines, Some(&save10), &PricingConfig::default());

        assert_eq!(totals.subtotal, Money::from_major(300));
        assert_eq!(totals.discount, Money::from_major(10));
        assert_eq!(totals.taxable_base(), Money::from_major(290));
        assert_eq!(totals.tax, Money::from_major(58));
        assert_eq!(totals.shipping_cost, Money::new(2999, 2));
        assert_eq!(totals.total, Money::new(37799, 2));
    }

    #[test]
    fn test_tax_on_discounted_base() {
        let lines = vec![line("SKU-1", Money::from_major(1000), 1)];
        let hundred_off = coupon(DiscountKind::FixedAmount, 100);

        let totals = price(&lines, Some(&hundred_off), &PricingConfig::default());

        assert_eq!(totals.taxable_base(), Money::from_major(900));
        assert_eq!(totals.tax, Money::from_major(180));
        assert_eq!(totals.shipping_cost, Money::ZERO);
        assert_eq!(totals.total, Money::from_major(1080));
    }

    #[test]
    fn test_percentage_discount_is_capped() {
        let lines = vec![line("SKU-1", Money::from_major(1000), 1)];
        let half_off = coupon(DiscountKind::Percentage, 50).with_max_discount(Money::from_major(100));

        let totals = price(&lines, Some(&half_off), &PricingConfig::default());

        assert_eq!(totals.discount, Money::from_major(100));
    }

    #[test]
    fn test_free_shipping_boundary() {
        let config = PricingConfig::default();

        let below = price(&[line("SKU-1", Money::new(49999, 2), 1)], None, &config);
        assert_eq!(below.shipping_cost, Money::new(2999, 2));

        let at = price(&[line("SKU-1", Money::new(50000, 2), 1)], None, &config);
        assert_eq!(at.shipping_cost, Money::ZERO);

        // The threshold applies after the discount
        let discounted = price(
            &[line("SKU-1", Money::from_major(510), 1)],
            Some(&coupon(DiscountKind::FixedAmount, 20)),
            &config,
        );
        assert_eq!(discounted.shipping_cost, Money::new(2999, 2));
    }

    #[test]
    fn test_discount_price_wins_over_list_price() {
        let lines = vec![
            line("SKU-1", Money::from_major(100), 2).with_discount_price(Money::from_major(80)),
            line("SKU-2", Money::new(1050, 2), 1),
        ];

        let totals = price(&lines, None, &PricingConfig::default());
        assert_eq!(totals.subtotal, Money::new(17050, 2));
    }

    #[test]
    fn test_inactive_coupon_gives_no_discount() {
        let lines = vec![line("SKU-1", Money::from_major(100), 1)];
        let mut off = coupon(DiscountKind::FixedAmount, 10);
        off.is_active = false;

        let totals = price(&lines, Some(&off), &PricingConfig::default());
        assert_eq!(totals.discount, Money::ZERO);
    }

    #[test]
    fn test_discount_never_exceeds_subtotal() {
        let lines = vec![line("SKU-1", Money::from_major(5), 1)];
        let big = coupon(DiscountKind::FixedAmount, 50);

        let totals = price(&lines, Some(&big), &PricingConfig::default());
        assert_eq!(totals.discount, Money::from_major(5));
        assert_eq!(totals.tax, Money::ZERO);
        assert_eq!(totals.total, Money::new(2999, 2));
    }

    #[test]
    fn test_tax_is_rounded_to_cents() {
        let lines = vec![line("SKU-1", Money::new(1999, 2), 1)];
        let totals = price(&lines, None, &PricingConfig::default());

        // 19.99 * 0.20 = 3.998
        assert_eq!(totals.tax, Money::new(400, 2));
        assert_eq!(totals.total, Money::new(5398, 2));
    }

    #[test]
    fn test_pricing_is_idempotent() {
        let lines = vec![
            line("SKU-1", Money::new(3333, 2), 3),
            line("SKU-2", Money::new(1999, 2), 7),
        ];
        let pct = coupon(DiscountKind::Percentage, 15);
        let config = PricingConfig::default();

        let first = price(&lines, Some(&pct), &config);
        let second = price(&lines, Some(&pct), &config);
        assert_eq!(first, second);

        let mut reversed = lines.clone();
        reversed.reverse();
        assert_eq!(price(&reversed, Some(&pct), &config), first);
    }

    #[test]
    fn test_empty_lines_price_to_zero() {
        assert_eq!(price(&[], None, &PricingConfig::default()), Totals::zero());
    }
}
