//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// Administrative transitions:
/// ```text
/// Pending    ──► Confirmed | Processing | Shipped | Cancelled
/// Confirmed  ──► Processing | Shipped | Cancelled
/// Processing ──► Shipped | Cancelled
/// Shipped    ──► Delivered | Returned | Cancelled
/// Delivered  ──► Returned | Refunded
/// Returned   ──► Refunded
/// Cancelled  ──► Refunded
/// ```
/// Refunded is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Placed, awaiting confirmation.
    #[default]
    Pending,

    /// Payment confirmed.
    Confirmed,

    /// Being picked and packed.
    Processing,

    /// Handed to a carrier.
    Shipped,

    /// Received by the customer.
    Delivered,

    /// Cancelled; stock has been restored.
    Cancelled,

    /// Sent back by the customer.
    Returned,

    /// Money given back (terminal state).
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Returned,
        OrderStatus::Refunded,
    ];

    /// Returns true if an administrator may move an order from this status to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed | Processing | Shipped | Cancelled)
                | (Confirmed, Processing | Shipped | Cancelled)
                | (Processing, Shipped | Cancelled)
                | (Shipped, Delivered | Returned | Cancelled)
                | (Delivered, Returned | Refunded)
                | (Returned, Refunded)
                | (Cancelled, Refunded)
        )
    }

    /// Returns true if the customer may still cancel the order.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    /// Returns true if a shipment may be recorded against the order.
    pub fn can_ship(&self) -> bool {
        !matches!(self, OrderStatus::Cancelled)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Returned => "Returned",
            OrderStatus::Refunded => "Refunded",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment state of an order, tracked alongside its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Refunded => "Refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
        assert_eq!(PaymentStatus::default(), PaymentStatus::Pending);
    }

    #[test]
    fn test_customer_cancel_window() {
        assert!(OrderStatus::Pending.can_cancel());
        assert!(OrderStatus::Confirmed.can_cancel());
        assert!(!OrderStatus::Processing.can_cancel());
        assert!(!OrderStatus::Shipped.can_cancel());
        assert!(!OrderStatus::Delivered.can_cancel());
        assert!(!OrderStatus::Cancelled.can_cancel());
        assert!(!OrderStatus::Returned.can_cancel());
        assert!(!OrderStatus::Refunded.can_cancel());
    }

    #[test]
    fn test_forward_transitions() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
        assert!(OrderStatus::Delivered.can_transition_to(OrderStatus::Returned));
        assert!(OrderStatus::Returned.can_transition_to(OrderStatus::Refunded));
        assert!(OrderStatus::Cancelled.can_transition_to(OrderStatus::Refunded));
    }

    #[test]
    fn test_backward_and_repeated_transitions_are_rejected() {
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Confirmed));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));

        // Cancelling twice would restore stock twice
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Cancelled));

        for status in OrderStatus::ALL {
            assert!(!status.can_transition_to(status));
        }
    }

    #[test]
    fn test_refunded_is_terminal() {
        for next in OrderStatus::ALL {
            assert!(!OrderStatus::Refunded.can_transition_to(next));
        }
    }

    #[test]
    fn test_only_cancelled_is_unshippable() {
        for status in OrderStatus::ALL {
            assert_eq!(status.can_ship(), status != OrderStatus::Cancelled);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(OrderStatus::Pending.to_string(), "Pending");
        assert_eq!(OrderStatus::Refunded.to_string(), "Refunded");
        assert_eq!(PaymentStatus::Paid.to_string(), "Paid");
    }

    #[test]
    fn test_serialization() {
        let status = OrderStatus::Processing;
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, "\"Processing\"");
        let deserialized: OrderStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(status, deserialized);
    }
}
