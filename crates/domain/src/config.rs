//! Commerce configuration loaded from environment variables.

use std::str::FromStr;

use crate::pricing::PricingConfig;

/// Pricing and lifecycle settings with sensible defaults.
///
/// Reads from environment variables:
/// - `TAX_RATE`: fraction applied to the discounted subtotal (default: `0.20`)
/// - `FREE_SHIPPING_THRESHOLD`: discounted subtotal at which shipping is free (default: `500`)
/// - `FLAT_SHIPPING_COST`: shipping charged below the threshold (default: `29.99`)
/// - `CART_TTL_DAYS`: nominal cart lifetime (default: `7`)
/// - `ORDER_NUMBER_ATTEMPTS`: tries at generating an unused order number (default: `5`)
#[derive(Debug, Clone)]
pub struct CommerceConfig {
    pub pricing: PricingConfig,
    pub cart_ttl_days: i64,
    pub order_number_attempts: u32,
}

impl CommerceConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            pricing: PricingConfig {
                tax_rate: parse_or(&lookup, "TAX_RATE", defaults.pricing.tax_rate),
                free_shipping_threshold: parse_or(
                    &lookup,
                    "FREE_SHIPPING_THRESHOLD",
                    defaults.pricing.free_shipping_threshold,
                ),
                flat_shipping_cost: parse_or(
                    &lookup,
                    "FLAT_SHIPPING_COST",
                    defaults.pricing.flat_shipping_cost,
                ),
            },
            cart_ttl_days: parse_or(&lookup, "CART_TTL_DAYS", defaults.cart_ttl_days),
            order_number_attempts: parse_or(
                &lookup,
                "ORDER_NUMBER_ATTEMPTS",
                defaults.order_number_attempts,
            )
            .max(1),
        }
    }
}

impl Default for CommerceConfig {
    fn default() -> Self {
        Self {
            pricing: PricingConfig::default(),
            cart_ttl_days: 7,
            order_number_attempts: 5,
        }
    }
}

/// Parses a variable, keeping the default (with a warning) when it is malformed.
pub fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, "ignoring unparsable configuration value");
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use common::Money;
    use rust_decimal::Decimal;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = CommerceConfig::default();
        assert_eq!(config.pricing.tax_rate, Decimal::new(20, 2));
        assert_eq!(config.pricing.free_shipping_threshold, Money::from_major(500));
        assert_eq!(config.pricing.flat_shipping_cost, Money::new(2999, 2));
        assert_eq!(config.cart_ttl_days, 7);
        assert_eq!(config.order_number_attempts, 5);
    }

    #[test]
    fn test_overrides_from_lookup() {
        let config = CommerceConfig::from_lookup(lookup(&[
            ("TAX_RATE", "0.18"),
            ("FREE_SHIPPING_THRESHOLD", "750"),
            ("FLAT_SHIPPING_COST", "19.90"),
            ("CART_TTL_DAYS", "30"),
        ]));
        assert_eq!(config.pricing.tax_rate, Decimal::new(18, 2));
        assert_eq!(config.pricing.free_shipping_threshold, Money::from_major(750));
        assert_eq!(config.pricing.flat_shipping_cost, Money::new(1990, 2));
        assert_eq!(config.cart_ttl_days, 30);
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let config = CommerceConfig::from_lookup(lookup(&[
            ("TAX_RATE", "twenty percent"),
            ("ORDER_NUMBER_ATTEMPTS", "0"),
        ]));
        assert_eq!(config.pricing.tax_rate, Decimal::new(20, 2));
        assert_eq!(config.order_number_attempts, 1);
    }
}
