//! Shipping configuration loaded from environment variables.

use std::time::Duration;

use domain::config::parse_or;

use crate::model::ContactInfo;

/// Reads from environment variables:
/// - `CARRIER_TIMEOUT_MS`: upper bound on any single carrier call (default: `10000`)
/// - `SENDER_NAME`, `SENDER_PHONE`, `SENDER_EMAIL`, `SENDER_ADDRESS`,
///   `SENDER_CITY`, `SENDER_DISTRICT`, `SENDER_POSTAL_CODE`: the warehouse
///   printed as sender on every shipment (city default: `Istanbul`)
#[derive(Debug, Clone)]
pub struct ShippingConfig {
    pub carrier_timeout: Duration,
    pub sender: ContactInfo,
}

impl ShippingConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let timeout_ms = parse_or(
            &lookup,
            "CARRIER_TIMEOUT_MS",
            u64::try_from(defaults.carrier_timeout.as_millis()).unwrap_or(10_000),
        );
        let text = |key: &str, default: String| lookup(key).unwrap_or(default);
        let sender = defaults.sender;

        Self {
            carrier_timeout: Duration::from_millis(timeout_ms),
            sender: ContactInfo {
                full_name: text("SENDER_NAME", sender.full_name),
                phone: text("SENDER_PHONE", sender.phone),
                email: lookup("SENDER_EMAIL").or(sender.email),
                address: text("SENDER_ADDRESS", sender.address),
                city: text("SENDER_CITY", sender.city),
                district: text("SENDER_DISTRICT", sender.district),
                postal_code: text("SENDER_POSTAL_CODE", sender.postal_code),
            },
        }
    }
}

impl Default for ShippingConfig {
    fn default() -> Self {
        Self {
            carrier_timeout: Duration::from_secs(10),
            sender: ContactInfo {
                full_name: "E-Commerce Ltd.".to_string(),
                phone: "+90 212 123 45 67".to_string(),
                email: Some("info@example.com".to_string()),
                address: "Ornek Mah. Test Sok. No:1".to_string(),
                city: "Istanbul".to_string(),
                district: "Kadikoy".to_string(),
                postal_code: "34000".to_string(),
            },
        }
    }
}
