//! Value objects for the order domain.

use chrono::{DateTime, Utc};
use common::{Money, ProductId, UserId};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::OrderStatus;
use crate::cart::CartLine;

/// A postal address, copied onto the order at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

impl Address {
    /// Returns the first missing required field, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("full_name", &self.full_name),
            ("phone", &self.phone),
            ("address_line1", &self.address_line1),
            ("city", &self.city),
            ("country", &self.country),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }

    /// Street lines joined for display.
    pub fn street(&self) -> String {
        match &self.address_line2 {
            Some(line2) if !line2.trim().is_empty() => format!("{}, {}", self.address_line1, line2),
            _ => self.address_line1.clone(),
        }
    }
}

/// How the customer intends to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    CreditCard,
    BankTransfer,
    CashOnDelivery,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "CreditCard",
            PaymentMethod::BankTransfer => "BankTransfer",
            PaymentMethod::CashOnDelivery => "CashOnDelivery",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "Credit card",
            PaymentMethod::BankTransfer => "Bank transfer",
            PaymentMethod::CashOnDelivery => "Cash on delivery",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A line of an order: an immutable copy of a cart line at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_image: Option<String>,
    pub sku: String,
    pub price: Money,
    pub discount_price: Option<Money>,
    pub quantity: u32,
    pub variant: Option<String>,
    pub subtotal: Money,
}

impl OrderItem {
    /// Price charged per unit.
    pub fn unit_price(&self) -> Money {
        self.discount_price.unwrap_or(self.price)
    }
}

impl From<&CartLine> for OrderItem {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id.clone(),
            product_name: line.product_name.clone(),
            product_image: line.product_image.clone(),
            sku: line.sku.clone(),
            price: line.price,
            discount_price: line.discount_price,
            quantity: line.quantity,
            variant: line.variant.clone(),
            subtotal: line.subtotal(),
        }
    }
}

/// One entry of an order's append-only status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: OrderStatus,
    pub note: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// `None` for system-driven changes.
    pub changed_by: Option<UserId>,
}

/// Generates a human-readable order number: `ORD-{yyyyMMddHHmmss}-{1000..=9999}`.
///
/// Unique enough in practice; the store's unique key catches the rare clash.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::rng().random_range(1000..=9999);
    format!("ORD-{}-{suffix}", now.format("%Y%m%d%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> Address {
        Address {
            full_name: "Ada Yilmaz".into(),
            phone: "+90 555 000 0000".into(),
            email: "ada@example.com".into(),
            address_line1: "Bagdat Cd. 1".into(),
            address_line2: Some("Daire 4".into()),
            city: "Istanbul".into(),
            state: "Kadikoy".into(),
            postal_code: "34710".into(),
            country: "TR".into(),
        }
    }

    #[test]
    fn test_address_validation() {
        assert_eq!(address().missing_field(), None);

        let blank_city = Address {
            city: "  ".into(),
            ..address()
        };
        assert_eq!(blank_city.missing_field(), Some("city"));
    }

    #[test]
    fn test_address_street() {
        assert_eq!(address().street(), "Bagdat Cd. 1, Daire 4");
        let single = Address {
            address_line2: None,
            ..address()
        };
        assert_eq!(single.street(), "Bagdat Cd. 1");
    }

    #[test]
    fn test_order_item_snapshots_cart_line() {
        let line = CartLine::new(ProductId::new("SKU-1"), "Widget", "W-1", Money::from_major(20), 3)
            .with_discount_price(Money::from_major(15))
            .with_variant("red");
        let item = OrderItem::from(&line);

        assert_eq!(item.unit_price(), Money::from_major(15));
        assert_eq!(item.subtotal, Money::from_major(45));
        assert_eq!(item.variant.as_deref(), Some("red"));
        assert_eq!(item.sku, "W-1");
    }

    #[test]
    fn test_order_number_format() {
        let now = Utc::now();
        let number = generate_order_number(now);
        let parts: Vec<&str> = number.split('-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert_eq!(parts[1], now.format("%Y%m%d%H%M%S").to_string());
        let suffix: u32 = parts[2].parse().unwrap();
        assert!((1000..=9999).contains(&suffix));
    }

    #[test]
    fn test_payment_method_serialization() {
        let json = serde_json::to_string(&PaymentMethod::CashOnDelivery).unwrap();
        assert_eq!(json, "\"CashOnDelivery\"");
        assert_eq!(PaymentMethod::BankTransfer.label(), "Bank transfer");
    }
}
