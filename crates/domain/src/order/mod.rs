//! Order aggregate, checkout and order lifecycle.

mod aggregate;
mod checkout;
mod query;
mod service;
mod state;
mod value_objects;

pub use aggregate::{NewOrder, Order};
pub use checkout::CheckoutRequest;
pub use query::{OrderFilter, OrderStats, Page};
pub use service::{OrderService, StatusUpdate};
pub use state::{OrderStatus, PaymentStatus};
pub use value_objects::{
    Address, OrderItem, PaymentMethod, StatusHistoryEntry, generate_order_number,
};

use common::ErrorKind;
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// Checkout was attempted on a cart with no lines.
    #[error("cart is empty")]
    EmptyCart,

    /// Customer cancellation after processing started.
    #[error("order cannot be cancelled in {status} status")]
    NotCancellable { status: OrderStatus },

    /// Shipment recorded against a cancelled order.
    #[error("order cannot be shipped in {status} status")]
    NotShippable { status: OrderStatus },

    /// Administrative move not allowed by the status table.
    #[error("invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// Payment attempted on an order that is not awaiting it.
    #[error("order payment is already {payment_status}")]
    PaymentNotPending { payment_status: PaymentStatus },
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::EmptyCart => ErrorKind::EmptyCart,
            OrderError::NotCancellable { .. } => ErrorKind::OrderNotCancellable,
            OrderError::NotShippable { .. } => ErrorKind::OrderNotShippable,
            OrderError::InvalidStatusTransition { .. } | OrderError::PaymentNotPending { .. } => {
                ErrorKind::InvalidTransition
            }
        }
    }
}
