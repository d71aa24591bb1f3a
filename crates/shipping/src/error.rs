//! Shipping error types.

use std::time::Duration;

use common::{ErrorKind, OrderId};
use domain::{DomainError, OrderStatus};
use thiserror::Error;

use crate::carrier::CarrierCode;

/// Errors that can occur during shipment operations.
#[derive(Debug, Error)]
pub enum ShippingError {
    /// No gateway is registered for the requested carrier.
    #[error("Unsupported carrier: {0}")]
    UnsupportedCarrier(String),

    /// The order already has a shipment.
    #[error("A shipment already exists for order {0}")]
    ShipmentAlreadyExists(OrderId),

    /// The order is in a status that cannot be handed to a carrier.
    #[error("Order in status {status} cannot be shipped")]
    OrderNotShippable { status: OrderStatus },

    /// The carrier answered with a failure.
    #[error("{} error: {detail}", .carrier.display_name())]
    Carrier { carrier: CarrierCode, detail: String },

    /// The carrier did not answer in time.
    #[error("{} did not answer within {after:?}", .carrier.display_name())]
    Timeout { carrier: CarrierCode, after: Duration },

    /// No shipment matches the given reference.
    #[error("Shipment not found: {0}")]
    NotFound(String),

    /// Structurally invalid request.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error raised by the order side.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl ShippingError {
    /// Classifies the error for callers at the edge.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ShippingError::UnsupportedCarrier(_) => ErrorKind::UnsupportedCarrier,
            ShippingError::ShipmentAlreadyExists(_) => ErrorKind::ShipmentAlreadyExists,
            ShippingError::OrderNotShippable { .. } => ErrorKind::OrderNotShippable,
            ShippingError::Carrier { .. } | ShippingError::Timeout { .. } => {
                ErrorKind::CarrierError
            }
            ShippingError::NotFound(_) => ErrorKind::NotFound,
            ShippingError::InvalidInput(_) => ErrorKind::InvalidInput,
            ShippingError::Domain(e) => e.kind(),
        }
    }
}

/// Convenience type alias for shipping results.
pub type Result<T> = std::result::Result<T, ShippingError>;
