//! Invoice rendering.
//!
//! [`render_invoice`] is a pure function of the order and the issuing
//! company; nothing is stored.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::order::{Address, Order};

/// Company block printed at the top of every invoice.
///
/// Reads from environment variables:
/// - `INVOICE_COMPANY_NAME` (default: `E-Commerce Ltd.`)
/// - `INVOICE_COMPANY_ADDRESS` (default: `Istanbul, Turkey`)
/// - `INVOICE_COMPANY_PHONE` (default: `+90 212 000 00 00`)
/// - `INVOICE_COMPANY_EMAIL` (default: `billing@example.com`)
/// - `INVOICE_TAX_NUMBER` (default: `0000000000`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceIssuer {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub tax_number: String,
}

impl InvoiceIssuer {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            name: lookup("INVOICE_COMPANY_NAME").unwrap_or(defaults.name),
            address: lookup("INVOICE_COMPANY_ADDRESS").unwrap_or(defaults.address),
            phone: lookup("INVOICE_COMPANY_PHONE").unwrap_or(defaults.phone),
            email: lookup("INVOICE_COMPANY_EMAIL").unwrap_or(defaults.email),
            tax_number: lookup("INVOICE_TAX_NUMBER").unwrap_or(defaults.tax_number),
        }
    }
}

impl Default for InvoiceIssuer {
    fn default() -> Self {
        Self {
            name: "E-Commerce Ltd.".to_string(),
            address: "Istanbul, Turkey".to_string(),
            phone: "+90 212 000 00 00".to_string(),
            email: "billing@example.com".to_string(),
            tax_number: "0000000000".to_string(),
        }
    }
}

/// A rendered document ready to hand to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceDocument {
    pub file_name: String,
    pub content_type: String,
    pub body: String,
}

/// Escapes text for inclusion in HTML.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn address_block(out: &mut String, title: &str, address: &Address) {
    let _ = write!(
        out,
        "<div class=\"block\"><h3>{}</h3><p>{}<br>{}<br>{} {} {}<br>{}<br>{} | {}</p></div>",
        escape_html(title),
        escape_html(&address.full_name),
        escape_html(&address.street()),
        escape_html(&address.postal_code),
        escape_html(&address.city),
        escape_html(&address.state),
        escape_html(&address.country),
        escape_html(&address.phone),
        escape_html(&address.email),
    );
}

/// Renders an order as an HTML invoice.
pub fn render_invoice(order: &Order, issuer: &InvoiceIssuer) -> InvoiceDocument {
    let number = escape_html(&order.order_number);
    let mut body = String::new();

    let _ = write!(
        body,
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Invoice {number}</title>\
         <style>body{{font-family:sans-serif}}table{{width:100%;border-collapse:collapse}}\
         td,th{{border:1px solid #ddd;padding:6px}}.right{{text-align:right}}</style></head><body>"
    );
    let _ = write!(body, "<h1>INVOICE</h1><p>Invoice no: {number}</p>");

    let _ = write!(
        body,
        "<div class=\"block\"><h3>{}</h3><p>{}<br>{} | {}<br>Tax no: {}</p></div>",
        escape_html(&issuer.name),
        escape_html(&issuer.address),
        escape_html(&issuer.phone),
        escape_html(&issuer.email),
        escape_html(&issuer.tax_number),
    );

    address_block(&mut body, "Bill to", &order.billing_address);
    address_block(&mut body, "Ship to", &order.shipping_address);

    let _ = write!(
        body,
        "<div class=\"block\"><h3>Order</h3><p>Order no: {number}<br>Date: {}<br>Payment: {} ({})<br>Status: {}",
        order.created_at.format("%d.%m.%Y %H:%M"),
        order.payment_method.label(),
        order.payment_status,
        order.status,
    );
    if let Some(tracking) = &order.tracking_number {
        let carrier = order.carrier_name.as_deref().unwrap_or("-");
        let _ = write!(
            body,
            "<br>Carrier: {}<br>Tracking: {}",
            escape_html(carrier),
            escape_html(tracking)
        );
    }
    body.push_str("</p></div>");

    body.push_str(
        "<table><thead><tr><th>Product</th><th>SKU</th><th class=\"right\">Qty</th>\
         <th class=\"right\">Unit price</th><th class=\"right\">Amount</th></tr></thead><tbody>",
    );
    for item in &order.items {
        let name = match &item.variant {
            Some(variant) => format!("{} ({variant})", item.product_name),
            None => item.product_name.clone(),
        };
        let _ = write!(
            body,
            "<tr><td>{}</td><td>{}</td><td class=\"right\">{}</td><td class=\"right\">{}</td><td class=\"right\">{}</td></tr>",
            escape_html(&name),
            escape_html(&item.sku),
            item.quantity,
            item.unit_price(),
            item.subtotal,
        );
    }
    body.push_str("</tbody></table>");

    let totals = &order.totals;
    body.push_str("<table class=\"totals\">");
    let _ = write!(body, "<tr><td>Subtotal</td><td class=\"right\">{}</td></tr>", totals.subtotal);
    if !totals.discount.is_zero() && !totals.discount.is_negative() {
        let label = match &order.coupon_code {
            Some(code) => format!("Discount ({})", escape_html(code)),
            None => "Discount".to_string(),
        };
        let _ = write!(body, "<tr><td>{label}</td><td class=\"right\">-{}</td></tr>", totals.discount);
    }
    let _ = write!(body, "<tr><td>Tax</td><td class=\"right\">{}</td></tr>", totals.tax);
    let _ = write!(body, "<tr><td>Shipping</td><td class=\"right\">{}</td></tr>", totals.shipping_cost);
    let _ = write!(
        body,
        "<tr><th>Total</th><th class=\"right\">{}</th></tr></table></body></html>",
        totals.total
    );

    InvoiceDocument {
        file_name: format!("invoice-{}.html", order.order_number),
        content_type: "text/html".to_string(),
        body,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use common::{Money, ProductId, UserId};

    use super::*;
    use crate::cart::CartLine;
    use crate::order::{NewOrder, OrderItem, PaymentMethod};
    use crate::pricing::{PricingConfig, price};

    fn address(name: &str) -> Address {
        Address {
            full_name: name.into(),
            phone: "555".into(),
            email: "x@example.com".into(),
            address_line1: "Street 1".into(),
            address_line2: None,
            city: "Bursa".into(),
            state: "Nilufer".into(),
            postal_code: "16000".into(),
            country: "TR".into(),
        }
    }

    fn order(name: &str, coupon_code: Option<&str>, discount: Money) -> Order {
        let lines = vec![
            CartLine::new(ProductId::new("SKU-1"), "Lamp", "SKU-1", Money::from_major(100), 3),
        ];
        let mut totals = price(&lines, None, &PricingConfig::default());
        totals.discount = discount;
        Order::place(
            NewOrder {
                order_number: "ORD-20260101120000-4321".into(),
                user_id: UserId::new(),
                items: lines.iter().map(OrderItem::from).collect(),
                totals,
                coupon_code: coupon_code.map(str::to_string),
                shipping_address: address(name),
                billing_address: address(name),
                payment_method: PaymentMethod::CreditCard,
                notes: None,
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_document_metadata() {
        let doc = render_invoice(&order("Ada", None, Money::ZERO), &InvoiceIssuer::default());
        assert_eq!(doc.file_name, "invoice-ORD-20260101120000-4321.html");
        assert_eq!(doc.content_type, "text/html");
        assert!(doc.body.contains("E-Commerce Ltd."));
        assert!(doc.body.contains("300.00"));
    }

    #[test]
    fn test_discount_line_only_when_discounted() {
        let issuer = InvoiceIssuer::default();

        let plain = render_invoice(&order("Ada", None, Money::ZERO), &issuer);
        assert!(!plain.body.contains("Discount"));

        let discounted = render_invoice(&order("Ada", Some("SAVE10"), Money::from_major(10)), &issuer);
        assert!(discounted.body.contains("Discount (SAVE10)"));
        assert!(discounted.body.contains("-10.00"));
    }

    #[test]
    fn test_customer_text_is_escaped() {
        let doc = render_invoice(
            &order("<script>alert('x')</script>", None, Money::ZERO),
            &InvoiceIssuer::default(),
        );
        assert!(!doc.body.contains("<script>"));
        assert!(doc.body.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
    }

    #[test]
    fn test_issuer_from_lookup() {
        let issuer = InvoiceIssuer::from_lookup(|key| {
            (key == "INVOICE_COMPANY_NAME").then(|| "Acme A.S.".to_string())
        });
        assert_eq!(issuer.name, "Acme A.S.");
        assert_eq!(issuer.tax_number, InvoiceIssuer::default().tax_number);
    }
}
