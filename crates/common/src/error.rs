//! Flat classification of every failure the core can report.

use serde::{Deserialize, Serialize};

/// What went wrong, independent of which crate raised it.
///
/// Callers at the edge (HTTP handlers, job runners) map these to their own
/// status codes; the core only promises that each failure falls in exactly one
/// kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    InvalidInput,
    InsufficientStock,
    CouponInvalid,
    CouponExpired,
    CouponLimitReached,
    MinimumPurchaseNotMet,
    EmptyCart,
    OrderNotCancellable,
    OrderNotShippable,
    ShipmentAlreadyExists,
    UnsupportedCarrier,
    CarrierError,
    InvalidTransition,
    /// Lost an optimistic-concurrency race; safe to retry.
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::InsufficientStock => "insufficient_stock",
            ErrorKind::CouponInvalid => "coupon_invalid",
            ErrorKind::CouponExpired => "coupon_expired",
            ErrorKind::CouponLimitReached => "coupon_limit_reached",
            ErrorKind::MinimumPurchaseNotMet => "minimum_purchase_not_met",
            ErrorKind::EmptyCart => "empty_cart",
            ErrorKind::OrderNotCancellable => "order_not_cancellable",
            ErrorKind::OrderNotShippable => "order_not_shippable",
            ErrorKind::ShipmentAlreadyExists => "shipment_already_exists",
            ErrorKind::UnsupportedCarrier => "unsupported_carrier",
            ErrorKind::CarrierError => "carrier_error",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal",
        }
    }

    /// Whether retrying the same request unchanged can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Conflict | ErrorKind::CarrierError)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
