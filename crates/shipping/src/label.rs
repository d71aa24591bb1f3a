//! Printable shipping labels.

use std::fmt::Write;

use domain::invoice::escape_html;
use serde::{Deserialize, Serialize};

use crate::model::{CargoShipment, ContactInfo};

/// A rendered label ready to hand to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingLabel {
    pub file_name: String,
    pub content_type: String,
    pub body: String,
}

fn contact_block(out: &mut String, title: &str, contact: &ContactInfo) {
    let _ = write!(
        out,
        "<h3>{title}</h3><p>{}<br>{}<br>{} / {} {}<br>Tel: {}</p><hr>",
        escape_html(&contact.full_name),
        escape_html(&contact.address),
        escape_html(&contact.city),
        escape_html(&contact.district),
        escape_html(&contact.postal_code),
        escape_html(&contact.phone),
    );
}

/// Renders a shipment as an HTML label.
pub fn render_label(shipment: &CargoShipment) -> ShippingLabel {
    let tracking = escape_html(&shipment.tracking_number);
    let mut body = String::from(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><style>\
         body{font-family:Arial;padding:20px}\
         .label{border:2px solid black;padding:20px;width:400px}\
         .barcode{text-align:center;font-size:24px;font-weight:bold}\
         </style></head><body><div class=\"label\">",
    );

    let _ = write!(
        body,
        "<h2>{}</h2><div class=\"barcode\">{tracking}</div><p>Order: {}</p><hr>",
        escape_html(shipment.carrier.display_name()),
        escape_html(&shipment.order_number),
    );
    contact_block(&mut body, "Sender", &shipment.sender);
    contact_block(&mut body, "Receiver", &shipment.receiver);

    let _ = write!(
        body,
        "<p><strong>Weight:</strong> {} kg<br><strong>Billable weight:</strong> {}<br>\
         <strong>Pieces:</strong> {}</p></div></body></html>",
        shipment.package.weight, shipment.billable_weight, shipment.package.package_count,
    );

    ShippingLabel {
        file_name: format!("label-{}.html", shipment.tracking_number),
        content_type: "text/html".to_string(),
        body,
    }
}
